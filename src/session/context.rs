//! Session context: the one handle the application uses to start, change and
//! observe the session.
//!
//! Startup verification runs once and keeps the snapshot in a loading phase
//! until it settles. Login, register and profile updates re-raise their errors;
//! only startup swallows them and settles into `Anonymous`.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::{
    sync::{watch, OnceCell},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};

use super::{
    refresh::RefreshOutcome,
    state::{Phase, SessionSnapshot},
};
use crate::api::{
    auth,
    types::{AuthPayload, ProfileUpdate, Registration, User},
    ApiClient, Error,
};

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

fn check_credentials(email: &str, password: &SecretString) -> Result<(), Error> {
    if !valid_email(email) {
        return Err(Error::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    if password.expose_secret().is_empty() {
        return Err(Error::Validation("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SessionContext {
    api: ApiClient,
    startup: Arc<OnceCell<()>>,
    pending_logout: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            startup: Arc::new(OnceCell::new()),
            pending_logout: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.api.state().snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.api.state().subscribe()
    }

    /// Waits until the session has left the loading phases.
    pub async fn settled(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|snapshot| !snapshot.is_loading()).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        };
        settled
    }

    /// Restores the persisted session and verifies it with the backend.
    ///
    /// Runs once; later calls return the current snapshot. Never fails: any
    /// unrecoverable problem settles the session into `Anonymous`.
    ///
    /// A login or register that completes while verification is running wins:
    /// the verification result is dropped instead of touching the new session.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionSnapshot {
        self.startup.get_or_init(|| self.verify_stored()).await;
        self.snapshot()
    }

    async fn verify_stored(&self) {
        let state = self.api.state();
        if state.phase() != Phase::Uninitialized {
            debug!(phase = ?state.phase(), "Session already started");
            return;
        }

        let restored = state.restore();
        let epoch = state.epoch();
        if !restored.access_token && !restored.refresh_token {
            debug!("No stored session");
            state.forget_if_current(epoch);
            return;
        }

        if !restored.access_token {
            debug!("Only a refresh token is stored, refreshing before verification");
            if let RefreshOutcome::Failed = self.api.refresher().refresh().await {
                info!("Stored session could not be renewed");
                return;
            }
        }

        let applied = match auth::profile(&self.api).await {
            Ok(user) => {
                info!(user = %user.id, "Session verified");
                state.set_user_if_current(epoch, user)
            }
            Err(err) if err.is_transport() => {
                warn!(error = %err, "Backend unreachable, keeping stored session for next start");
                state.forget_if_current(epoch)
            }
            Err(err) => {
                info!(error = %err, "Stored session rejected");
                state.clear_if_current(epoch)
            }
        };

        if !applied {
            debug!("Session replaced during verification");
        }
    }

    /// Signs in and replaces any current session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a malformed email without contacting
    /// the server, and the server's message on rejected credentials. Nothing is
    /// persisted on failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, Error> {
        let email = email.trim();
        check_credentials(email, password)?;
        self.finish_logout().await;

        let payload = auth::login(&self.api, email, password).await?;
        Ok(self.establish(payload))
    }

    /// Creates an account and signs into it.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, Error> {
        if registration.name.trim().is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }
        check_credentials(registration.email.trim(), &registration.password)?;
        self.finish_logout().await;

        let payload = auth::register(&self.api, registration).await?;
        Ok(self.establish(payload))
    }

    fn establish(&self, payload: AuthPayload) -> User {
        let AuthPayload {
            user,
            access_token,
            refresh_token,
        } = payload;
        info!(user = %user.id, "Signed in");
        self.api
            .state()
            .establish(access_token, refresh_token, user.clone());
        user
    }

    /// Ends the session locally right away and invalidates it on the server in
    /// the background. Failures of the server call are only logged.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        let state = self.api.state();
        let token = state.access_token();
        state.clear();
        info!("Signed out");

        let Some(token) = token else {
            return;
        };

        let api = self.api.clone();
        let handle = tokio::spawn(async move {
            match auth::logout(&api, token).await {
                Ok(()) => debug!("Server session invalidated"),
                Err(err) => warn!(error = %err, "Logout request failed"),
            }
        });

        if let Some(previous) = self.pending().replace(handle) {
            debug!(finished = previous.is_finished(), "Replacing earlier logout call");
        }
    }

    /// Waits for the background logout call, if one is still running.
    pub async fn finish_logout(&self) {
        let pending = self.pending().take();
        if let Some(handle) = pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "Logout task did not complete");
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending_logout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Updates profile fields and caches the server's copy.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the cached profile is left unchanged.
    #[instrument(skip(self, update))]
    pub async fn update_user(&self, update: &ProfileUpdate) -> Result<User, Error> {
        if update.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }

        let user = auth::update_profile(&self.api, update).await?;
        if !self.api.state().set_user(user.clone()) {
            debug!("Session ended during profile update");
        }
        Ok(user)
    }
}
