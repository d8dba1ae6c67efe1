//! In-memory session state.
//!
//! Fields are read through accessors; mutation is crate-private and only
//! happens inside [`crate::AuthSessionManager`] transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ums_core::TenantId;

use crate::{AuthError, UserProfile};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    LoggingOut,
}

impl core::fmt::Display for AuthState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::Refreshing => "refreshing",
            AuthState::LoggingOut => "logging_out",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    state: AuthState,
    profile: Option<UserProfile>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    is_authenticated: bool,
    error: Option<AuthError>,
}

impl Session {
    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Error recorded by the most recent transition, if it failed.
    pub fn error(&self) -> Option<&AuthError> {
        self.error.as_ref()
    }

    /// Tenant that entity screens should scope their queries to.
    pub fn active_tenant(&self) -> Option<TenantId> {
        self.profile.as_ref().map(|p| p.tenant_id)
    }

    /// Enter an in-flight state. Clears the previous error.
    pub(crate) fn begin(&mut self, state: AuthState) {
        self.state = state;
        self.error = None;
    }

    /// Credentials now valid; session is authenticated.
    pub(crate) fn establish(
        &mut self,
        profile: UserProfile,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.state = AuthState::Authenticated;
        self.profile = Some(profile);
        self.access_token = Some(access_token);
        self.refresh_token = refresh_token;
        self.expires_at = expires_at;
        self.is_authenticated = true;
    }

    /// Swap in a refreshed access token; refresh token and profile stay.
    pub(crate) fn replace_access_token(&mut self, access_token: String, expires_at: DateTime<Utc>) {
        self.state = AuthState::Authenticated;
        self.access_token = Some(access_token);
        self.expires_at = Some(expires_at);
        self.is_authenticated = true;
    }

    /// Drop all credentials and return to `Anonymous`. The error is kept.
    pub(crate) fn destroy(&mut self) {
        self.state = AuthState::Anonymous;
        self.profile = None;
        self.access_token = None;
        self.refresh_token = None;
        self.expires_at = None;
        self.is_authenticated = false;
    }

    pub(crate) fn record(&mut self, error: AuthError) {
        self.error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }
}
