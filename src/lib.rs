//! # GreenVerse session client
//!
//! `greenverse` is the client side of the GreenVerse gardening network: it keeps
//! a user's session alive against the REST backend and routes every API call
//! through a single authenticated gateway.
//!
//! ## Session lifecycle
//!
//! A session is an access token, a refresh token and the cached user profile.
//! It is restored from a [`session::SessionStore`] on startup, verified against
//! `GET /users/profile`, and published to subscribers as
//! [`session::SessionSnapshot`] values.
//!
//! ## Token renewal
//!
//! Access tokens are short-lived. When a call comes back `401`, the gateway asks
//! the [`session::RefreshCoordinator`] for a new token and retries the call once.
//! Any number of simultaneous `401`s share one refresh request. A refresh token
//! the server rejects ends the session; callers see
//! [`api::Error::SessionExpired`] and the [`session::RouteGuard`] starts
//! redirecting to the login view.
//!
//! Tokens are kept in `SecretString` and must never be logged.

pub mod api;
pub mod cli;
pub mod config;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub use api::{ApiClient, ApiRequest, Error};
pub use config::ClientConfig;
pub use session::{SessionContext, SessionSnapshot};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
