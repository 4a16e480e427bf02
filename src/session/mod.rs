//! Session lifecycle: persistence, single-flight token refresh, the session
//! context and the route guard.

pub mod context;
pub mod guard;
pub mod refresh;
pub mod state;
pub mod store;

pub use context::{valid_email, SessionContext};
pub use guard::{GuardDecision, RouteGuard};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use state::{Phase, SessionSnapshot, SessionState};
pub use store::{FileStore, MemoryStore, SessionStore, StoreKey};
