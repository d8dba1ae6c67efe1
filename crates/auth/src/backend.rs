use async_trait::async_trait;
use thiserror::Error;

use crate::{ApiEnvelope, LoginData, LoginRequest, LogoutData, RefreshData};

/// Transport-level failure talking to the auth backend.
///
/// Business rejections (bad password, unknown refresh token) come back inside
/// the envelope instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend state unavailable")]
    Unavailable,
}

/// Login/refresh/logout capability consumed by the session manager.
///
/// The shipped implementation is [`crate::MockAuthBackend`]; a network-backed
/// client slots in behind the same trait.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<ApiEnvelope<LoginData>, BackendError>;

    async fn refresh(&self, refresh_token: &str) -> Result<ApiEnvelope<RefreshData>, BackendError>;

    /// Best-effort; the session is cleared whatever this returns.
    async fn logout(&self) -> Result<ApiEnvelope<LogoutData>, BackendError>;
}
