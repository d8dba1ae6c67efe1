//! Session configuration, read from `UMS_*` environment variables.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

const DEV_TOKEN_SECRET: &str = "ums-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// HS256 secret used by the token issuer.
    pub token_secret: String,
    pub access_token_ttl: Duration,
    /// Silent refresh fires once remaining lifetime drops to this or below.
    pub refresh_threshold: Duration,
    pub expiry_check_every: StdDuration,
    pub refresh_check_every: StdDuration,
    /// Sleep in the mock backend to mimic a remote service.
    pub simulate_latency: bool,
    /// Session file; `None` keeps the session in memory only.
    pub storage_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_secret: DEV_TOKEN_SECRET.to_string(),
            access_token_ttl: Duration::hours(1),
            refresh_threshold: Duration::minutes(5),
            expiry_check_every: StdDuration::from_secs(5 * 60),
            refresh_check_every: StdDuration::from_secs(60),
            simulate_latency: true,
            storage_path: None,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let token_secret = lookup("UMS_TOKEN_SECRET").unwrap_or_else(|| {
            tracing::warn!("UMS_TOKEN_SECRET not set; using insecure dev default");
            DEV_TOKEN_SECRET.to_string()
        });

        let secs = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            let Some(raw) = lookup(key) else {
                return Ok(default);
            };
            let value: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key,
                value: raw.clone(),
            })?;
            if value == 0 {
                return Err(ConfigError::Zero { key });
            }
            Ok(value)
        };

        let access_token_ttl = secs(
            "UMS_ACCESS_TOKEN_TTL_SECS",
            defaults.access_token_ttl.num_seconds().unsigned_abs(),
        )?;
        let refresh_threshold = secs(
            "UMS_REFRESH_THRESHOLD_SECS",
            defaults.refresh_threshold.num_seconds().unsigned_abs(),
        )?;
        let expiry_check_every = secs(
            "UMS_EXPIRY_CHECK_SECS",
            defaults.expiry_check_every.as_secs(),
        )?;
        let refresh_check_every = secs(
            "UMS_REFRESH_CHECK_SECS",
            defaults.refresh_check_every.as_secs(),
        )?;

        let simulate_latency = lookup("UMS_SIMULATE_LATENCY")
            .map(|raw| !matches!(raw.trim(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.simulate_latency);

        let storage_path = lookup("UMS_SESSION_FILE")
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            token_secret,
            access_token_ttl: Duration::seconds(access_token_ttl as i64),
            refresh_threshold: Duration::seconds(refresh_threshold as i64),
            expiry_check_every: StdDuration::from_secs(expiry_check_every),
            refresh_check_every: StdDuration::from_secs(refresh_check_every),
            simulate_latency,
            storage_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("UMS_TOKEN_SECRET", "s3cret"),
            ("UMS_REFRESH_THRESHOLD_SECS", "120"),
            ("UMS_REFRESH_CHECK_SECS", "15"),
            ("UMS_SIMULATE_LATENCY", "off"),
            ("UMS_SESSION_FILE", "/tmp/ums/session.json"),
        ]))
        .unwrap();

        assert_eq!(config.token_secret, "s3cret");
        assert_eq!(config.refresh_threshold, Duration::minutes(2));
        assert_eq!(config.refresh_check_every, StdDuration::from_secs(15));
        assert!(!config.simulate_latency);
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/ums/session.json")));
    }

    #[test]
    fn rejects_non_numeric_and_zero_intervals() {
        let err = SessionConfig::from_lookup(lookup(&[("UMS_EXPIRY_CHECK_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "UMS_EXPIRY_CHECK_SECS", .. }));

        let err = SessionConfig::from_lookup(lookup(&[("UMS_REFRESH_CHECK_SECS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero { key: "UMS_REFRESH_CHECK_SECS" });
    }
}
