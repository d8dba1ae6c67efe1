use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use ums_core::{OrganizationId, TenantId, UserId};

/// Access-token claims as carried in the token payload.
///
/// Timestamps travel as whole seconds since the Unix epoch (`iat`, `exp`),
/// so sub-second precision is dropped by [`AccessClaims::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    pub email: String,

    /// Tenant the session acts within.
    pub tenant_id: TenantId,

    pub organization_id: OrganizationId,

    /// Display name.
    pub name: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    /// Build claims valid for `ttl` starting at `issued_at`.
    pub fn new(
        sub: UserId,
        email: impl Into<String>,
        tenant_id: TenantId,
        organization_id: OrganizationId,
        name: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issued_at = truncate_to_seconds(issued_at);
        Self {
            sub,
            email: email.into(),
            tenant_id,
            organization_id,
            name: name.into(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Same identity, fresh validity window.
    pub fn reissued(&self, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = truncate_to_seconds(issued_at);
        Self {
            issued_at,
            expires_at: issued_at + ttl,
            ..self.clone()
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime; negative once expired.
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

pub(crate) fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
