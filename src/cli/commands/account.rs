use clap::{Arg, ArgGroup, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::{ProfileUpdate, Registration};

pub const CMD_LOGIN: &str = "login";
pub const CMD_REGISTER: &str = "register";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_WHOAMI: &str = "whoami";
pub const CMD_PROFILE: &str = "profile";

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_NAME: &str = "name";
pub const ARG_PHONE: &str = "phone";
pub const ARG_BIO: &str = "bio";
pub const ARG_LOCATION: &str = "location";
pub const ARG_AVATAR: &str = "avatar";

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .short('e')
        .long("email")
        .help("Account email")
        .env("GREENVERSE_EMAIL")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .short('p')
        .long("password")
        .help("Account password")
        .env("GREENVERSE_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Sign in and store the session")
                .arg(email_arg())
                .arg(password_arg()),
        )
        .subcommand(
            Command::new(CMD_REGISTER)
                .about("Create an account and sign in")
                .arg(
                    Arg::new(ARG_NAME)
                        .short('n')
                        .long("name")
                        .help("Display name")
                        .required(true),
                )
                .arg(email_arg())
                .arg(
                    Arg::new(ARG_PHONE)
                        .long("phone")
                        .help("Phone number")
                        .default_value(""),
                )
                .arg(password_arg()),
        )
        .subcommand(Command::new(CMD_LOGOUT).about("Sign out and forget the stored session"))
        .subcommand(Command::new(CMD_WHOAMI).about("Show the signed-in user"))
        .subcommand(
            Command::new(CMD_PROFILE)
                .about("Update profile fields")
                .arg(Arg::new(ARG_NAME).long("name").help("Display name"))
                .arg(Arg::new(ARG_BIO).long("bio").help("Short bio"))
                .arg(Arg::new(ARG_LOCATION).long("location").help("Location"))
                .arg(Arg::new(ARG_AVATAR).long("avatar").help("Avatar URL"))
                .group(
                    ArgGroup::new("profile-fields")
                        .args([ARG_NAME, ARG_BIO, ARG_LOCATION, ARG_AVATAR])
                        .multiple(true)
                        .required(true),
                ),
        )
}

fn read_required(matches: &ArgMatches, id: &str) -> anyhow::Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
}

#[derive(Debug)]
pub struct Login {
    pub email: String,
    pub password: SecretString,
}

impl Login {
    /// # Errors
    /// Returns an error if email or password are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        Ok(Self {
            email: read_required(matches, ARG_EMAIL)?,
            password: SecretString::from(read_required(matches, ARG_PASSWORD)?),
        })
    }
}

/// # Errors
/// Returns an error if a required field is missing.
pub fn parse_registration(matches: &ArgMatches) -> anyhow::Result<Registration> {
    Ok(Registration {
        name: read_required(matches, ARG_NAME)?,
        email: read_required(matches, ARG_EMAIL)?,
        phone: matches
            .get_one::<String>(ARG_PHONE)
            .cloned()
            .unwrap_or_default(),
        password: SecretString::from(read_required(matches, ARG_PASSWORD)?),
    })
}

#[must_use]
pub fn parse_profile(matches: &ArgMatches) -> ProfileUpdate {
    let get = |id: &str| matches.get_one::<String>(id).cloned();
    ProfileUpdate {
        name: get(ARG_NAME),
        bio: get(ARG_BIO),
        location: get(ARG_LOCATION),
        avatar: get(ARG_AVATAR),
    }
}
