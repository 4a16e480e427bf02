//! Maps parsed command-line arguments to an [`Action`].

use anyhow::{Context, Result};
use std::time::Duration;

use crate::cli::{
    actions::{Action, Task},
    commands::{account, connection, content},
    globals::GlobalArgs,
};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let options = connection::Options::parse(matches)?;
    let globals = GlobalArgs::new(
        options.api_url,
        options.session_file,
        Duration::from_secs(options.timeout_seconds),
    );

    let (name, sub) = matches.subcommand().context("missing command")?;
    let task = match name {
        account::CMD_LOGIN => Task::Login(account::Login::parse(sub)?),
        account::CMD_REGISTER => Task::Register(account::parse_registration(sub)?),
        account::CMD_LOGOUT => Task::Logout,
        account::CMD_WHOAMI => Task::WhoAmI,
        account::CMD_PROFILE => Task::Profile(account::parse_profile(sub)),
        content::CMD_POSTS => Task::Posts(content::Posts::parse(sub)),
        content::CMD_POST => Task::Post(content::Post::parse(sub)?),
        content::CMD_NOTIFICATIONS => Task::Notifications(content::Notifications::parse(sub)),
        other => anyhow::bail!("unknown command: {other}"),
    };

    Ok(Action::new(globals, task))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_handler_builds_action() {
        temp_env::with_vars(
            [
                ("GREENVERSE_API_URL", Some("http://127.0.0.1:5000/api")),
                ("GREENVERSE_SESSION_FILE", Some("/tmp/gv-session.json")),
                ("GREENVERSE_TIMEOUT", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "greenverse",
                    "posts",
                    "--category",
                    "Herbs",
                ]);
                let action = handler(&matches).unwrap();
                assert_eq!(action.globals.api_url, "http://127.0.0.1:5000/api");
                assert_eq!(action.globals.timeout, Duration::from_secs(10));
                assert_eq!(action.task.route(), "/feed");
                assert!(matches!(
                    action.task,
                    Task::Posts(content::Posts { category: Some(ref c) }) if c == "Herbs"
                ));
            },
        );
    }

    #[test]
    fn test_handler_register() {
        temp_env::with_vars([("GREENVERSE_PASSWORD", Some("s3cret"))], || {
            let matches = commands::new().get_matches_from(vec![
                "greenverse",
                "register",
                "--name",
                "Rina",
                "--email",
                "rina@example.com",
            ]);
            let action = handler(&matches).unwrap();
            match action.task {
                Task::Register(registration) => {
                    assert_eq!(registration.name, "Rina");
                    assert_eq!(registration.phone, "");
                }
                other => panic!("unexpected task: {other:?}"),
            }
        });
    }
}
