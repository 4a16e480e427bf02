//! Client configuration: where the backend lives, how long a request may take,
//! and which path the route guard sends anonymous visitors to. Values are
//! public; do not store secrets here.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
/// Default request timeout applied to every gateway call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout: Duration,
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Joins the configured base URL and an endpoint path with exactly one `/`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        build_url_with_base(&self.api_base_url, path)
    }
}

fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let config = ClientConfig::new("https://api.greenverse.app/api/");
        assert_eq!(
            config.endpoint("/users/login"),
            "https://api.greenverse.app/api/users/login"
        );
        assert_eq!(
            config.endpoint("posts?category=Herbs"),
            "https://api.greenverse.app/api/posts?category=Herbs"
        );
    }

    #[test]
    fn endpoint_without_base_returns_path() {
        let config = ClientConfig::new("  ");
        assert_eq!(config.endpoint("/users/profile"), "/users/profile");
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.login_path, "/login");

        let config = config
            .with_timeout(Duration::from_secs(3))
            .with_login_path("/signin");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.login_path, "/signin");
    }
}
