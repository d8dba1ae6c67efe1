//! Response envelopes exchanged with the auth backend.
//!
//! Every call answers `{success, data, message, error, trace_id}`; only one of
//! `data` / `error` is meaningful depending on `success`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ums_core::{OrganizationId, TenantId, UserId};

use crate::AuthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,

    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: JsonValue,
}

impl ApiErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: JsonValue::Object(Default::default()),
        }
    }
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
            trace_id: None,
        }
    }

    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        let body = ApiErrorBody::new(code, message);
        Self {
            success: false,
            data: None,
            message: Some(body.message.clone()),
            error: Some(body),
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Unwrap into the payload, or the error the backend reported.
    ///
    /// A failure without an error body falls back to the top-level message.
    pub fn into_result(self) -> Result<T, AuthError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(body)) => Err(body.into()),
            (success, _, None) => Err(AuthError::Rejected {
                code: "UNKNOWN".to_string(),
                message: self.message.unwrap_or_else(|| {
                    if success {
                        "response carried no data".to_string()
                    } else {
                        "request failed".to_string()
                    }
                }),
            }),
        }
    }
}

/// Successful login payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub email: String,
    #[serde(alias = "tenant_region_url")]
    pub region_endpoint: String,
    /// Access-token expiry, milliseconds since epoch on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// Successful refresh payload. The refresh token itself is not rotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshData {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutData {}

fn bearer() -> String {
    "bearer".to_string()
}
