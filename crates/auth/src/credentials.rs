use serde::{Deserialize, Serialize};

use ums_core::{TenantId, is_valid_email};

use crate::AuthError;

const MIN_PASSWORD_CHARS: usize = 4;

/// Login form submission.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Tenant to sign into; the backend picks its default when absent.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            tenant_id: None,
        }
    }

    pub fn for_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Local checks run before any backend call. Email first, then password.
    pub fn validate(&self) -> Result<(), AuthError> {
        if !is_valid_email(&self.email) {
            return Err(AuthError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::InvalidPassword);
        }
        Ok(())
    }

    /// Part of the email before `@`, used as a display name.
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}
