//! In-memory auth backend.
//!
//! Accepts any well-formed email/password pair, issues signed access tokens
//! through [`TokenCodec`], and remembers the single outstanding refresh token.
//! Optional per-call latency simulates a remote service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use ums_core::{Clock, OrganizationId, TenantId, UserId};

use crate::{
    AccessClaims, ApiEnvelope, AuthBackend, BackendError, LoginData, LoginRequest, LogoutData,
    RefreshData, TokenCodec,
};

#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    /// Subject of every issued token.
    pub user_id: UserId,
    /// Tenant used when a login request names none.
    pub default_tenant: TenantId,
    pub default_organization: OrganizationId,
    pub region_endpoint: String,
    pub access_token_ttl: Duration,
    pub login_latency: std::time::Duration,
    pub refresh_latency: std::time::Duration,
    pub logout_latency: std::time::Duration,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            user_id: UserId::new(),
            default_tenant: TenantId::new(),
            default_organization: OrganizationId::new(),
            region_endpoint: "https://api.example.com".to_string(),
            access_token_ttl: Duration::hours(1),
            login_latency: std::time::Duration::from_millis(700),
            refresh_latency: std::time::Duration::from_millis(300),
            logout_latency: std::time::Duration::from_millis(200),
        }
    }
}

impl MockBackendConfig {
    pub fn without_latency(mut self) -> Self {
        self.login_latency = std::time::Duration::ZERO;
        self.refresh_latency = std::time::Duration::ZERO;
        self.logout_latency = std::time::Duration::ZERO;
        self
    }
}

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    pub login: usize,
    pub refresh: usize,
    pub logout: usize,
}

#[derive(Debug, Clone)]
struct IssuedTokens {
    refresh_token: String,
    claims: AccessClaims,
}

pub struct MockAuthBackend {
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    config: MockBackendConfig,
    issued: Mutex<Option<IssuedTokens>>,
    fail_logout: AtomicBool,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockAuthBackend {
    pub fn new(codec: TokenCodec, clock: Arc<dyn Clock>, config: MockBackendConfig) -> Self {
        Self {
            codec,
            clock,
            config,
            issued: Mutex::new(None),
            fail_logout: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &MockBackendConfig {
        &self.config
    }

    /// Make subsequent logout calls fail at the transport level.
    pub fn set_logout_failure(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Forget the outstanding refresh token, as a backend restart would.
    pub fn revoke_all(&self) {
        if let Ok(mut issued) = self.issued.lock() {
            *issued = None;
        }
    }

    pub fn calls(&self) -> BackendCalls {
        BackendCalls {
            login: self.login_calls.load(Ordering::SeqCst),
            refresh: self.refresh_calls.load(Ordering::SeqCst),
            logout: self.logout_calls.load(Ordering::SeqCst),
        }
    }

    fn issued(&self) -> Result<MutexGuard<'_, Option<IssuedTokens>>, BackendError> {
        self.issued.lock().map_err(|_| BackendError::Unavailable)
    }

    fn trace_id(&self) -> String {
        format!("mock-trace-{}", self.clock.now().timestamp_millis())
    }

    async fn simulate_latency(latency: std::time::Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn new_refresh_token() -> String {
    format!("refresh_{}", Uuid::now_v7().simple())
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, request: &LoginRequest) -> Result<ApiEnvelope<LoginData>, BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Self::simulate_latency(self.config.login_latency).await;

        if let Err(err) = request.validate() {
            return Ok(ApiEnvelope::fail(err.code(), err.to_string()).with_trace_id(self.trace_id()));
        }

        let name = request.email_local_part().to_string();
        let claims = AccessClaims::new(
            self.config.user_id,
            request.email.clone(),
            request.tenant_id.unwrap_or(self.config.default_tenant),
            self.config.default_organization,
            name.clone(),
            self.clock.now(),
            self.config.access_token_ttl,
        );
        let access_token = self
            .codec
            .encode(&claims)
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let refresh_token = new_refresh_token();

        *self.issued()? = Some(IssuedTokens {
            refresh_token: refresh_token.clone(),
            claims: claims.clone(),
        });

        tracing::debug!(tenant_id = %claims.tenant_id, "mock backend issued tokens");

        let data = LoginData {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            organization_id: claims.organization_id,
            name,
            email: claims.email,
            region_endpoint: self.config.region_endpoint.clone(),
            expires_at: claims.expires_at,
        };
        Ok(ApiEnvelope::ok(data, "Login successful").with_trace_id(self.trace_id()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ApiEnvelope<RefreshData>, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Self::simulate_latency(self.config.refresh_latency).await;

        let mut issued = self.issued()?;
        let Some(current) = issued.as_mut().filter(|t| t.refresh_token == refresh_token) else {
            return Ok(
                ApiEnvelope::fail("INVALID_REFRESH_TOKEN", "Invalid refresh token")
                    .with_trace_id(self.trace_id()),
            );
        };

        let claims = current
            .claims
            .reissued(self.clock.now(), self.config.access_token_ttl);
        let access_token = self
            .codec
            .encode(&claims)
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let expires_at = claims.expires_at;
        current.claims = claims;
        drop(issued);

        let data = RefreshData {
            access_token,
            token_type: "bearer".to_string(),
            expires_at,
        };
        Ok(ApiEnvelope::ok(data, "Token refreshed successfully").with_trace_id(self.trace_id()))
    }

    async fn logout(&self) -> Result<ApiEnvelope<LogoutData>, BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Self::simulate_latency(self.config.logout_latency).await;

        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("logout endpoint unreachable".to_string()));
        }

        *self.issued()? = None;
        Ok(ApiEnvelope::ok(LogoutData::default(), "Logout successful").with_trace_id(self.trace_id()))
    }
}
