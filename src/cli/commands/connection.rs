use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT};

pub const ARG_API_URL: &str = "api-url";
pub const ARG_SESSION_FILE: &str = "session-file";
pub const ARG_TIMEOUT: &str = "timeout";

const SESSION_FILE_NAME: &str = "session.json";
const DEFAULT_TIMEOUT_SECONDS: &str = "10";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_URL)
                .long("api-url")
                .help("GreenVerse API base URL")
                .env("GREENVERSE_API_URL")
                .global(true)
                .default_value(DEFAULT_API_BASE_URL),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long("session-file")
                .help("Where the session tokens are kept (default: <config dir>/greenverse/session.json)")
                .env("GREENVERSE_SESSION_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long("timeout")
                .help("Request timeout in seconds")
                .env("GREENVERSE_TIMEOUT")
                .global(true)
                .default_value(DEFAULT_TIMEOUT_SECONDS)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub api_url: String,
    pub session_file: PathBuf,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse connection arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the API URL is empty or not a valid URL.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let api_url = matches
            .get_one::<String>(ARG_API_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_API_URL}"))?;
        url::Url::parse(&api_url)
            .map_err(|e| anyhow::anyhow!("invalid --{ARG_API_URL} {api_url}: {e}"))?;

        let session_file = matches
            .get_one::<PathBuf>(ARG_SESSION_FILE)
            .cloned()
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(default_session_file);

        let timeout_seconds = matches
            .get_one::<u64>(ARG_TIMEOUT)
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT.as_secs());

        Ok(Self {
            api_url,
            session_file,
            timeout_seconds,
        })
    }
}

/// `<config dir>/greenverse/session.json`, or the working directory when the
/// platform has no config dir.
#[must_use]
pub fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(env!("CARGO_PKG_NAME")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SESSION_FILE_NAME)
}
