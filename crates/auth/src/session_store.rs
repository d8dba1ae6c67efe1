//! Persisted mirror of the session (access token, refresh token, profile).

use std::sync::Arc;

use crate::{KeyValueStore, StoreError, UserProfile};

pub const ACCESS_TOKEN_KEY: &str = "ums_access_token";
pub const REFRESH_TOKEN_KEY: &str = "ums_refresh_token";
pub const USER_KEY: &str = "ums_user";

/// What was found in durable storage. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub profile: Option<UserProfile>,
}

impl PersistedSession {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.profile.is_none()
    }
}

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Overwrite all three keys.
    pub fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        profile: &UserProfile,
    ) -> Result<(), StoreError> {
        let profile = serde_json::to_string(profile)?;
        self.kv.set(ACCESS_TOKEN_KEY, access_token)?;
        self.kv.set(REFRESH_TOKEN_KEY, refresh_token)?;
        self.kv.set(USER_KEY, &profile)?;
        Ok(())
    }

    /// A malformed profile reads as absent.
    pub fn load(&self) -> PersistedSession {
        let profile = self.kv.get(USER_KEY).and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|err| tracing::debug!("discarding malformed persisted profile: {err}"))
                .ok()
        });

        PersistedSession {
            access_token: self.kv.get(ACCESS_TOKEN_KEY),
            refresh_token: self.kv.get(REFRESH_TOKEN_KEY),
            profile,
        }
    }

    /// Remove all three keys. Every key is attempted; the first failure is
    /// returned.
    pub fn clear(&self) -> Result<(), StoreError> {
        let results = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY].map(|key| self.kv.remove(key));
        results.into_iter().collect()
    }
}
