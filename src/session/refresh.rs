//! Single-flight exchange of the refresh token for a new access token.
//!
//! Flow Overview:
//! 1. The first caller finds the coordinator `Idle`, switches it to `Refreshing`
//!    and spawns the exchange on the runtime.
//! 2. Callers arriving while `Refreshing` only register a waiter.
//! 3. When the exchange finishes, every waiter receives the same outcome and the
//!    coordinator returns to `Idle`, ready for the next burst of `401`s.
//!
//! The exchange runs in its own task so a caller that gives up cannot abort it
//! halfway; the drop guard answers all waiters even if that task panics.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::state::SessionState;
use crate::api::{
    error::{map_request_error, Error},
    read_envelope,
    types::{RefreshRequest, RefreshedTokens},
};
use crate::config::ClientConfig;

pub const REFRESH_PATH: &str = "/users/refresh-token";

/// Result shared by every caller of one refresh cycle.
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Renewed(SecretString),
    Failed,
}

impl RefreshOutcome {
    #[must_use]
    pub fn token(self) -> Option<SecretString> {
        match self {
            RefreshOutcome::Renewed(token) => Some(token),
            RefreshOutcome::Failed => None,
        }
    }
}

enum Flight {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    state: Arc<SessionState>,
    flight: Mutex<Flight>,
}

impl Inner {
    fn flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one exchange against the backend and records its result.
    #[instrument(skip(self))]
    async fn exchange(&self) -> RefreshOutcome {
        let epoch = self.state.epoch();
        let Some(refresh_token) = self.state.refresh_token() else {
            debug!("No refresh token stored, ending session");
            self.state.clear_if_current(epoch);
            return RefreshOutcome::Failed;
        };

        match self.request(&refresh_token).await {
            Ok(tokens) => match tokens.access_token {
                Some(access_token) => {
                    let rotated = tokens.refresh_token.is_some();
                    if self
                        .state
                        .apply_refresh(epoch, access_token.clone(), tokens.refresh_token)
                    {
                        info!(rotated, "Access token refreshed");
                        RefreshOutcome::Renewed(access_token)
                    } else {
                        RefreshOutcome::Failed
                    }
                }
                None => {
                    warn!("Refresh response carried no access token");
                    self.state.clear_if_current(epoch);
                    RefreshOutcome::Failed
                }
            },
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                self.state.clear_if_current(epoch);
                RefreshOutcome::Failed
            }
        }
    }

    async fn request(&self, refresh_token: &SecretString) -> Result<RefreshedTokens, Error> {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await
            .map_err(map_request_error)?;

        read_envelope::<RefreshedTokens>(response).await?.into_data()
    }
}

/// Returns the coordinator to `Idle` and answers every waiter, including when
/// the exchange task unwinds.
struct Landing {
    inner: Arc<Inner>,
    outcome: Option<RefreshOutcome>,
}

impl Drop for Landing {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(RefreshOutcome::Failed);
        let waiters = match std::mem::replace(&mut *self.inner.flight(), Flight::Idle) {
            Flight::Refreshing(waiters) => waiters,
            Flight::Idle => Vec::new(),
        };

        debug!(waiters = waiters.len(), "Refresh cycle complete");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Coalesces concurrent refresh attempts into one backend call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.inner.refresh_url)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ClientConfig, state: Arc<SessionState>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: config.endpoint(REFRESH_PATH),
                state,
                flight: Mutex::new(Flight::Idle),
            }),
        }
    }

    /// True while an exchange is outstanding.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        matches!(*self.inner.flight(), Flight::Refreshing(_))
    }

    /// Refreshes the access token, joining an exchange already in flight.
    ///
    /// A missing refresh token fails immediately without a network call. Any
    /// failure clears the session the exchange started on.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();

        let leader = {
            let mut flight = self.inner.flight();
            match &mut *flight {
                Flight::Refreshing(waiters) => {
                    waiters.push(tx);
                    false
                }
                Flight::Idle => {
                    *flight = Flight::Refreshing(vec![tx]);
                    true
                }
            }
        };

        if leader {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                let mut landing = Landing {
                    inner: Arc::clone(&inner),
                    outcome: None,
                };
                landing.outcome = Some(inner.exchange().await);
            });
        } else {
            debug!("Joining refresh already in flight");
        }

        rx.await.unwrap_or(RefreshOutcome::Failed)
    }
}
