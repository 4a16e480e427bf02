//! In-memory session shared by the gateway, the refresh coordinator and the
//! session context.
//!
//! Every mutation writes the persistent store and publishes a new
//! [`SessionSnapshot`] while holding the state lock, so no reader observes a
//! token without the matching store write. Each establish/clear bumps an epoch;
//! work that started under an older epoch (a slow refresh) is discarded instead
//! of being applied to a newer session.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::store::{SessionStore, StoreKey};
use crate::api::types::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Verifying,
    Authenticated,
    Anonymous,
}

/// Point-in-time view of the session published to subscribers.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub user: Option<User>,
    pub access_token: Option<SecretString>,
}

impl SessionSnapshot {
    fn empty(phase: Phase) -> Self {
        Self {
            phase,
            user: None,
            access_token: None,
        }
    }

    /// True only when both an access token and a resolved profile are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    /// True until startup verification has reached a terminal phase.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Uninitialized | Phase::Verifying)
    }

    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Which credentials were found in the store on startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Restored {
    pub access_token: bool,
    pub refresh_token: bool,
}

struct Inner {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    user: Option<User>,
    phase: Phase,
    epoch: u64,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            user: self.user.clone(),
            access_token: self.access_token.clone(),
        }
    }

    fn reset(&mut self, phase: Phase) {
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
        self.phase = phase;
        self.epoch += 1;
    }
}

pub struct SessionState {
    store: Arc<dyn SessionStore>,
    inner: Mutex<Inner>,
    tx: watch::Sender<SessionSnapshot>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionState")
            .field("phase", &inner.phase)
            .field("epoch", &inner.epoch)
            .field("user", &inner.user.as_ref().map(|user| &user.id))
            .finish_non_exhaustive()
    }
}

impl SessionState {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::empty(Phase::Uninitialized));
        Self {
            store,
            inner: Mutex::new(Inner {
                access_token: None,
                refresh_token: None,
                user: None,
                phase: Phase::Uninitialized,
                epoch: 0,
            }),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.snapshot());
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.lock().access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.lock().refresh_token.clone()
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.lock().refresh_token.is_some()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Loads persisted tokens into memory and enters `Verifying`.
    ///
    /// The cached profile is not trusted until the server confirms it.
    pub fn restore(&self) -> Restored {
        let mut inner = self.lock();
        inner.access_token = self
            .store
            .get(StoreKey::AccessToken)
            .filter(|token| !token.is_empty())
            .map(SecretString::from);
        inner.refresh_token = self
            .store
            .get(StoreKey::RefreshToken)
            .filter(|token| !token.is_empty())
            .map(SecretString::from);
        inner.user = None;
        inner.phase = Phase::Verifying;

        let restored = Restored {
            access_token: inner.access_token.is_some(),
            refresh_token: inner.refresh_token.is_some(),
        };
        debug!(
            access_token = restored.access_token,
            refresh_token = restored.refresh_token,
            "Session restored from store"
        );
        self.publish(&inner);
        restored
    }

    /// Stores a freshly issued session (login or register).
    pub fn establish(&self, access_token: SecretString, refresh_token: SecretString, user: User) {
        let mut inner = self.lock();
        match serde_json::to_string(&user) {
            Ok(user_json) => self.store.set_all(&[
                (StoreKey::AccessToken, access_token.expose_secret()),
                (StoreKey::RefreshToken, refresh_token.expose_secret()),
                (StoreKey::User, &user_json),
            ]),
            Err(err) => {
                warn!(error = %err, "Failed to serialize user profile");
                self.store.set_all(&[
                    (StoreKey::AccessToken, access_token.expose_secret()),
                    (StoreKey::RefreshToken, refresh_token.expose_secret()),
                ]);
            }
        }

        inner.access_token = Some(access_token);
        inner.refresh_token = Some(refresh_token);
        inner.user = Some(user);
        inner.phase = Phase::Authenticated;
        inner.epoch += 1;
        self.publish(&inner);
    }

    /// Applies refreshed tokens if the session is still the one the refresh
    /// started on. Returns whether the tokens were applied.
    pub fn apply_refresh(
        &self,
        epoch: u64,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(
                started = epoch,
                current = inner.epoch,
                "Discarding refresh for a replaced session"
            );
            return false;
        }

        match &refresh_token {
            Some(rotated) => self.store.set_all(&[
                (StoreKey::AccessToken, access_token.expose_secret()),
                (StoreKey::RefreshToken, rotated.expose_secret()),
            ]),
            None => self
                .store
                .set(StoreKey::AccessToken, access_token.expose_secret()),
        }

        inner.access_token = Some(access_token);
        if refresh_token.is_some() {
            inner.refresh_token = refresh_token;
        }
        self.publish(&inner);
        true
    }

    /// Replaces the cached profile. Ignored when there is no session to attach
    /// it to.
    pub fn set_user(&self, user: User) -> bool {
        let mut inner = self.lock();
        self.attach_user(&mut inner, user)
    }

    /// Like [`set_user`](Self::set_user), but only for the session identified
    /// by `epoch`. A profile fetched for a replaced session is dropped.
    pub fn set_user_if_current(&self, epoch: u64, user: User) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(
                started = epoch,
                current = inner.epoch,
                "Dropping profile for a replaced session"
            );
            return false;
        }
        self.attach_user(&mut inner, user)
    }

    fn attach_user(&self, inner: &mut Inner, user: User) -> bool {
        if inner.access_token.is_none() {
            debug!("Dropping profile for a session that no longer exists");
            return false;
        }

        match serde_json::to_string(&user) {
            Ok(user_json) => self.store.set(StoreKey::User, &user_json),
            Err(err) => warn!(error = %err, "Failed to serialize user profile"),
        }

        inner.user = Some(user);
        inner.phase = Phase::Authenticated;
        self.publish(inner);
        true
    }

    /// Wipes the store and memory and settles into `Anonymous`.
    pub fn clear(&self) {
        let mut inner = self.lock();
        self.store.clear();
        inner.reset(Phase::Anonymous);
        self.publish(&inner);
    }

    /// Like [`clear`](Self::clear), but only if no newer session replaced the
    /// one identified by `epoch`.
    pub fn clear_if_current(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        self.store.clear();
        inner.reset(Phase::Anonymous);
        self.publish(&inner);
        true
    }

    /// Settles into `Anonymous` without touching the store.
    pub fn forget(&self) {
        let mut inner = self.lock();
        inner.reset(Phase::Anonymous);
        self.publish(&inner);
    }

    /// Like [`forget`](Self::forget), but only if the session identified by
    /// `epoch` is still the current one.
    pub fn forget_if_current(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.reset(Phase::Anonymous);
        self.publish(&inner);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;
    use secrecy::ExposeSecret;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            name: "Rina".to_string(),
            email: "rina@example.com".to_string(),
            phone: None,
            avatar: None,
            bio: None,
            location: None,
            role: None,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn state() -> (Arc<MemoryStore>, SessionState) {
        let store = Arc::new(MemoryStore::new());
        let state = SessionState::new(store.clone());
        (store, state)
    }

    #[test]
    fn starts_uninitialized_and_loading() {
        let (_, state) = state();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, Phase::Uninitialized);
        assert!(snapshot.is_loading());
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn establish_persists_all_keys() {
        let (store, state) = state();
        state.establish(secret("a1"), secret("r1"), user());

        assert_eq!(store.get(StoreKey::AccessToken).as_deref(), Some("a1"));
        assert_eq!(store.get(StoreKey::RefreshToken).as_deref(), Some("r1"));
        let cached: User = serde_json::from_str(&store.get(StoreKey::User).unwrap()).unwrap();
        assert_eq!(cached, user());

        let snapshot = state.snapshot();
        assert!(snapshot.is_authenticated());
        assert!(!snapshot.is_loading());
    }

    #[test]
    fn restore_reads_tokens_but_not_profile() {
        let (store, state) = state();
        store.set(StoreKey::AccessToken, "a1");
        store.set(StoreKey::User, r#"{"id":"u1","name":"Rina","email":"rina@example.com"}"#);

        let restored = state.restore();
        assert!(restored.access_token);
        assert!(!restored.refresh_token);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, Phase::Verifying);
        assert!(snapshot.has_access_token());
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn refresh_for_replaced_session_is_discarded() {
        let (store, state) = state();
        state.establish(secret("a1"), secret("r1"), user());
        let epoch = state.epoch();

        state.clear();
        assert!(!state.apply_refresh(epoch, secret("a2"), None));

        assert_eq!(store.get(StoreKey::AccessToken), None);
        assert!(state.access_token().is_none());
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let (store, state) = state();
        state.establish(secret("a1"), secret("r1"), user());

        assert!(state.apply_refresh(state.epoch(), secret("a2"), None));
        assert_eq!(store.get(StoreKey::RefreshToken).as_deref(), Some("r1"));
        assert_eq!(state.access_token().unwrap().expose_secret(), "a2");

        assert!(state.apply_refresh(state.epoch(), secret("a3"), Some(secret("r2"))));
        assert_eq!(store.get(StoreKey::RefreshToken).as_deref(), Some("r2"));
        assert_eq!(state.refresh_token().unwrap().expose_secret(), "r2");
        assert!(state.snapshot().is_authenticated());
    }

    #[test]
    fn clear_if_current_spares_newer_sessions() {
        let (store, state) = state();
        state.establish(secret("a1"), secret("r1"), user());
        let old_epoch = state.epoch();
        state.establish(secret("a2"), secret("r2"), user());

        assert!(!state.clear_if_current(old_epoch));
        assert_eq!(store.get(StoreKey::AccessToken).as_deref(), Some("a2"));

        assert!(state.clear_if_current(state.epoch()));
        assert_eq!(store.get(StoreKey::AccessToken), None);
    }

    #[test]
    fn forget_keeps_store() {
        let (store, state) = state();
        store.set(StoreKey::AccessToken, "a1");
        state.restore();

        state.forget();
        assert_eq!(state.phase(), Phase::Anonymous);
        assert!(state.access_token().is_none());
        assert_eq!(store.get(StoreKey::AccessToken).as_deref(), Some("a1"));
    }

    #[test]
    fn set_user_requires_a_session() {
        let (store, state) = state();
        assert!(!state.set_user(user()));
        assert_eq!(store.get(StoreKey::User), None);
    }

    #[test]
    fn verification_result_for_replaced_session_is_dropped() {
        let (store, state) = state();
        store.set(StoreKey::AccessToken, "stale");
        state.restore();
        let startup_epoch = state.epoch();

        let mut fresh = user();
        fresh.id = "u2".to_string();
        state.establish(secret("a2"), secret("r2"), fresh.clone());

        assert!(!state.set_user_if_current(startup_epoch, user()));
        assert!(!state.forget_if_current(startup_epoch));
        assert!(!state.clear_if_current(startup_epoch));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.user, Some(fresh.clone()));
        assert_eq!(snapshot.access_token.unwrap().expose_secret(), "a2");
        let cached: User = serde_json::from_str(&store.get(StoreKey::User).unwrap()).unwrap();
        assert_eq!(cached, fresh);

        assert!(state.set_user_if_current(state.epoch(), user()));
        assert_eq!(state.snapshot().user, Some(user()));
    }

    #[test]
    fn subscribers_see_every_transition() {
        let (_, state) = state();
        let mut rx = state.subscribe();

        state.establish(secret("a1"), secret("r1"), user());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        state.clear();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.phase, Phase::Anonymous);
        assert!(!snapshot.is_authenticated());
    }
}
