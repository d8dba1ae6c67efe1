//! `ums-auth`: client-side session and token lifecycle.
//!
//! The session manager is the only stateful piece: it owns the current
//! [`Session`], mirrors it into a durable [`SessionStore`], and talks to an
//! [`AuthBackend`] for login, refresh and logout. Timers live in
//! [`SessionTimers`].

pub mod backend;
pub mod claims;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod manager;
pub mod mock_backend;
pub mod profile;
pub mod session;
pub mod session_store;
pub mod storage;
pub mod timers;
pub mod token;

pub use backend::{AuthBackend, BackendError};
pub use claims::AccessClaims;
pub use config::{ConfigError, SessionConfig};
pub use credentials::LoginRequest;
pub use envelope::{ApiEnvelope, ApiErrorBody, LoginData, LogoutData, RefreshData};
pub use error::AuthError;
pub use manager::{AuthSessionManager, RefreshOutcome};
pub use mock_backend::{BackendCalls, MockAuthBackend, MockBackendConfig};
pub use profile::UserProfile;
pub use session::{AuthState, Session};
pub use session_store::{PersistedSession, SessionStore};
pub use storage::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, StoreError};
pub use timers::SessionTimers;
pub use token::{TokenCodec, TokenError};
