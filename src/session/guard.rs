//! Decides whether a protected view may render for the current session.
//!
//! UX-only guard; real access control lives on the API.

use super::state::SessionSnapshot;
use crate::config::DEFAULT_LOGIN_PATH;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session state is still being resolved; show a loading indicator.
    Loading,
    /// Send the visitor to `to`, remembering where they wanted to go.
    Redirect { to: String, return_to: String },
    Render,
}

impl GuardDecision {
    /// Target location for a redirect, e.g. `/login?redirect=%2Fshop`.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Redirect { to, return_to } => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
                Some(format!("{to}?redirect={encoded}"))
            }
            GuardDecision::Loading | GuardDecision::Render => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PATH)
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn check(&self, snapshot: &SessionSnapshot, requested: &str) -> GuardDecision {
        if snapshot.is_loading() || (snapshot.has_access_token() && snapshot.user.is_none()) {
            return GuardDecision::Loading;
        }

        if snapshot.is_authenticated() || self.is_login_path(requested) {
            return GuardDecision::Render;
        }

        GuardDecision::Redirect {
            to: self.login_path.clone(),
            return_to: requested.to_string(),
        }
    }

    fn is_login_path(&self, requested: &str) -> bool {
        let path = requested.split(['?', '#']).next().unwrap_or(requested);
        path.trim_end_matches('/') == self.login_path.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::User;
    use crate::session::state::Phase;
    use secrecy::SecretString;

    fn snapshot(phase: Phase, token: bool, user: bool) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            user: user.then(|| User {
                id: "u1".to_string(),
                name: "Rina".to_string(),
                email: "rina@example.com".to_string(),
                phone: None,
                avatar: None,
                bio: None,
                location: None,
                role: None,
            }),
            access_token: token.then(|| SecretString::from("a1".to_string())),
        }
    }

    #[test]
    fn loading_while_verifying() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check(&snapshot(Phase::Verifying, true, false), "/shop"),
            GuardDecision::Loading
        );
        assert_eq!(
            guard.check(&snapshot(Phase::Uninitialized, false, false), "/shop"),
            GuardDecision::Loading
        );
    }

    #[test]
    fn loading_while_profile_is_missing() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check(&snapshot(Phase::Authenticated, true, false), "/shop"),
            GuardDecision::Loading
        );
    }

    #[test]
    fn renders_for_authenticated_session() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check(&snapshot(Phase::Authenticated, true, true), "/profile"),
            GuardDecision::Render
        );
    }

    #[test]
    fn anonymous_is_redirected_with_return_path() {
        let guard = RouteGuard::default();
        let decision = guard.check(&snapshot(Phase::Anonymous, false, false), "/groups/g1?tab=members");
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/login".to_string(),
                return_to: "/groups/g1?tab=members".to_string(),
            }
        );
        assert_eq!(
            decision.location().as_deref(),
            Some("/login?redirect=%2Fgroups%2Fg1%3Ftab%3Dmembers")
        );
    }

    #[test]
    fn login_view_is_never_redirected() {
        let guard = RouteGuard::new("/signin");
        let anonymous = snapshot(Phase::Anonymous, false, false);
        assert_eq!(guard.check(&anonymous, "/signin"), GuardDecision::Render);
        assert_eq!(guard.check(&anonymous, "/signin/?redirect=%2F"), GuardDecision::Render);
        assert!(matches!(
            guard.check(&anonymous, "/signup"),
            GuardDecision::Redirect { .. }
        ));
    }
}
