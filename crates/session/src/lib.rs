//! # Pantry Session
//!
//! Client-side session handling: the persisted token and user, the in-memory
//! session snapshot shared with the rest of the application, and the route
//! guards evaluated against it.
//!
//! [`SessionState`] is the only writer of the persisted token and user. Other
//! components read [`Session`] snapshots or subscribe to changes.

pub mod error;
pub mod guards;
pub mod manager;
pub mod navigation;
pub mod state;
pub mod storage;
pub mod token;

pub use error::{SessionError, SessionResult, StorageError};
pub use guards::{
    access_for, dashboard_for, evaluate, require_authenticated, require_role, Access, GuardOutcome,
};
pub use manager::{AuthBackend, SessionManager, Validation};
pub use navigation::{History, Navigator, Route};
pub use state::{Session, SessionState};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use token::{is_expired, is_expired_at, TokenStore, TOKEN_KEY, USER_KEY};
