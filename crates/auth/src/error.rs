use thiserror::Error;

use crate::BackendError;
use crate::envelope::ApiErrorBody;

/// Failures surfaced by session transitions.
///
/// Every variant is recoverable; the worst outcome is a forced logout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email format")]
    InvalidEmail,

    #[error("password must be at least 4 characters long")]
    InvalidPassword,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("access token could not be decoded: {0}")]
    TokenDecode(String),

    /// Collaborator rejected the request; message passed through verbatim.
    #[error("{message}")]
    Rejected { code: String, message: String },

    #[error("auth backend unreachable: {0}")]
    Transport(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::InvalidPassword => "INVALID_PASSWORD",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            AuthError::TokenDecode(_) => "TOKEN_DECODE",
            AuthError::Rejected { code, .. } => code,
            AuthError::Transport(_) => "TRANSPORT",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AuthError::InvalidEmail | AuthError::InvalidPassword)
    }
}

impl From<ApiErrorBody> for AuthError {
    fn from(body: ApiErrorBody) -> Self {
        match body.code.as_str() {
            "INVALID_EMAIL" => AuthError::InvalidEmail,
            "INVALID_PASSWORD" => AuthError::InvalidPassword,
            "INVALID_REFRESH_TOKEN" => AuthError::InvalidRefreshToken,
            _ => AuthError::Rejected {
                code: body.code,
                message: body.message,
            },
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        AuthError::Transport(err.to_string())
    }
}
