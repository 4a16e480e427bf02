pub mod account;
pub mod connection;
pub mod content;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("greenverse")
        .about("GreenVerse gardening network client")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true);

    let command = connection::with_args(command);
    let command = logging::with_args(command);
    let command = account::with_subcommands(command);
    content::with_subcommands(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::telemetry::LogFormat;
    use secrecy::ExposeSecret;
    use std::path::PathBuf;

    const ENV_VARS: [&str; 8] = [
        "GREENVERSE_API_URL",
        "GREENVERSE_SESSION_FILE",
        "GREENVERSE_TIMEOUT",
        "GREENVERSE_LOG_LEVEL",
        "GREENVERSE_LOG_FORMAT",
        "GREENVERSE_EMAIL",
        "GREENVERSE_PASSWORD",
        "RUST_LOG",
    ];

    fn without_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(ENV_VARS.map(|key| (key, None::<String>)), f);
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "greenverse");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "GreenVerse gardening network client"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_defaults() {
        without_env(|| {
            let matches = new().get_matches_from(vec!["greenverse", "whoami"]);
            let options = connection::Options::parse(&matches).unwrap();
            assert_eq!(options.api_url, "http://localhost:5000/api");
            assert_eq!(options.timeout_seconds, 10);
            assert!(options.session_file.ends_with("session.json"));
            assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(0));
            assert_eq!(
                matches.get_one::<LogFormat>(logging::ARG_LOG_FORMAT).copied(),
                Some(LogFormat::Text)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("GREENVERSE_API_URL", Some("https://api.greenverse.app/api")),
                ("GREENVERSE_SESSION_FILE", Some("/tmp/gv/session.json")),
                ("GREENVERSE_TIMEOUT", Some("3")),
                ("GREENVERSE_LOG_LEVEL", Some("info")),
                ("GREENVERSE_LOG_FORMAT", Some("json")),
                ("GREENVERSE_EMAIL", Some("rina@example.com")),
                ("GREENVERSE_PASSWORD", Some("hunter2")),
            ],
            || {
                let matches = new().get_matches_from(vec!["greenverse", "login"]);
                let options = connection::Options::parse(&matches).unwrap();
                assert_eq!(options.api_url, "https://api.greenverse.app/api");
                assert_eq!(options.session_file, PathBuf::from("/tmp/gv/session.json"));
                assert_eq!(options.timeout_seconds, 3);
                assert_eq!(matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(), Some(2));
                assert_eq!(
                    matches.get_one::<LogFormat>(logging::ARG_LOG_FORMAT).copied(),
                    Some(LogFormat::Json)
                );

                let (name, sub) = matches.subcommand().unwrap();
                assert_eq!(name, account::CMD_LOGIN);
                let login = account::Login::parse(sub).unwrap();
                assert_eq!(login.email, "rina@example.com");
                assert_eq!(login.password.expose_secret(), "hunter2");
            },
        );
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            without_env(|| {
                let mut args = vec!["greenverse".to_string(), "whoami".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(u8::try_from(index).unwrap())
                );
            });
        }
    }

    #[test]
    fn test_invalid_timeout_and_url() {
        without_env(|| {
            assert!(new()
                .try_get_matches_from(vec!["greenverse", "--timeout", "0", "whoami"])
                .is_err());

            let matches = new().get_matches_from(vec!["greenverse", "--api-url", "not a url", "whoami"]);
            assert!(connection::Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn test_login_requires_password() {
        without_env(|| {
            let result =
                new().try_get_matches_from(vec!["greenverse", "login", "-e", "rina@example.com"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_profile_requires_a_field() {
        without_env(|| {
            assert!(new()
                .try_get_matches_from(vec!["greenverse", "profile"])
                .is_err());

            let matches = new().get_matches_from(vec!["greenverse", "profile", "--bio", "Grows basil"]);
            let (_, sub) = matches.subcommand().unwrap();
            let update = account::parse_profile(sub);
            assert_eq!(update.bio.as_deref(), Some("Grows basil"));
            assert!(update.name.is_none());
        });
    }

    #[test]
    fn test_post_with_media() {
        without_env(|| {
            let matches = new().get_matches_from(vec![
                "greenverse",
                "post",
                "Tomatoes ripening",
                "--category",
                "Vegetables",
                "--media",
                "a.jpg",
                "-m",
                "b.mp4",
            ]);
            let (name, sub) = matches.subcommand().unwrap();
            assert_eq!(name, content::CMD_POST);
            let post = content::Post::parse(sub).unwrap();
            assert_eq!(post.category.as_deref(), Some("Vegetables"));
            assert_eq!(post.media, vec![PathBuf::from("a.jpg"), PathBuf::from("b.mp4")]);
        });
    }

    #[test]
    fn test_notification_flags() {
        without_env(|| {
            let parse = |args: Vec<&str>| {
                let matches = new().get_matches_from(args);
                let (_, sub) = matches.subcommand().unwrap();
                content::Notifications::parse(sub)
            };
            assert_eq!(
                parse(vec!["greenverse", "notifications"]),
                content::Notifications::List
            );
            assert_eq!(
                parse(vec!["greenverse", "notifications", "--mark-all-read"]),
                content::Notifications::MarkAllRead
            );
            assert_eq!(
                parse(vec!["greenverse", "notifications", "--mark-read", "n1"]),
                content::Notifications::MarkRead("n1".to_string())
            );
            assert!(new()
                .try_get_matches_from(vec![
                    "greenverse",
                    "notifications",
                    "--mark-all-read",
                    "--mark-read",
                    "n1"
                ])
                .is_err());
        });
    }
}
