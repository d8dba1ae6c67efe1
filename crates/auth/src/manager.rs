//! Session state machine.
//!
//! ```text
//! Anonymous --login--> Authenticating --ok--> Authenticated
//!                            \--err--> Anonymous
//! Authenticated --near expiry--> Refreshing --ok--> Authenticated
//!                                     \--err--> Anonymous
//! *  --logout--> LoggingOut --> Anonymous
//! Authenticated --expiry check finds token expired--> Anonymous
//! ```
//!
//! Async transitions are serialized by one lock, so the expiry check always
//! sees the token left behind by any refresh that was in flight.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, watch};

use ums_core::{Clock, TenantId};

use crate::{
    AuthBackend, AuthError, AuthState, LoginRequest, Session, SessionConfig, SessionStore,
    UserProfile, token,
};

/// Result of a silent-refresh evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No authenticated session to refresh.
    Skipped,
    /// Token still has more than the threshold left.
    NotDue { remaining: Duration },
    Refreshed { expires_at: DateTime<Utc> },
}

pub struct AuthSessionManager {
    backend: Arc<dyn AuthBackend>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    refresh_threshold: Duration,
    session: watch::Sender<Session>,
    transitions: Mutex<()>,
}

impl AuthSessionManager {
    /// Build the manager, rehydrating from `store` before returning.
    ///
    /// The persisted record is used only when it holds a profile and an
    /// unexpired access token; otherwise it is erased.
    pub fn new(
        config: &SessionConfig,
        backend: Arc<dyn AuthBackend>,
        store: SessionStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let initial = rehydrate(&store, clock.now());
        let (session, _) = watch::channel(initial);

        Self {
            backend,
            store,
            clock,
            refresh_threshold: config.refresh_threshold,
            session,
            transitions: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn state(&self) -> AuthState {
        self.session.borrow().state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    pub fn active_tenant(&self) -> Option<TenantId> {
        self.session.borrow().active_tenant()
    }

    /// Observe every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn clear_error(&self) {
        self.session.send_modify(Session::clear_error);
    }

    /// Validate locally, then authenticate against the backend.
    ///
    /// Validation failures never reach the backend. On any failure the session
    /// ends up `Anonymous` with the error recorded.
    pub async fn login(&self, request: LoginRequest) -> Result<UserProfile, AuthError> {
        let _transition = self.transitions.lock().await;
        self.session.send_modify(|s| s.begin(AuthState::Authenticating));

        if let Err(err) = request.validate() {
            return Err(self.reject_login(err));
        }

        let data = match self.backend.login(&request).await {
            Ok(envelope) => envelope.into_result(),
            Err(err) => Err(err.into()),
        };
        let data = match data {
            Ok(data) => data,
            Err(err) => return Err(self.reject_login(err)),
        };

        let profile = UserProfile::from(&data);
        if let Err(err) = self.store.save(&data.access_token, &data.refresh_token, &profile) {
            tracing::warn!("failed to persist session after login: {err}");
        }

        self.session.send_modify(|s| {
            s.establish(
                profile.clone(),
                data.access_token,
                Some(data.refresh_token),
                Some(data.expires_at),
            )
        });
        tracing::info!(
            user_id = %profile.user_id,
            tenant_id = %profile.tenant_id,
            "login succeeded"
        );

        Ok(profile)
    }

    /// Clear the session and the persisted record.
    ///
    /// Always ends `Anonymous`; a backend failure is returned and recorded
    /// but does not keep the session alive.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _transition = self.transitions.lock().await;
        self.session.send_modify(|s| s.begin(AuthState::LoggingOut));

        let outcome = match self.backend.logout().await {
            Ok(envelope) => envelope.into_result().map(|_| ()),
            Err(err) => Err(err.into()),
        };

        self.erase_persisted();
        self.session.send_modify(|s| {
            s.destroy();
            if let Err(err) = &outcome {
                s.record(err.clone());
            }
        });

        match &outcome {
            Ok(()) => tracing::info!("logged out"),
            Err(err) => tracing::warn!("logout call failed, session cleared anyway: {err}"),
        }
        outcome
    }

    /// Refresh the access token if its remaining lifetime is within the
    /// threshold. Undecodable tokens count as a refresh failure.
    pub async fn refresh_if_due(&self) -> Result<RefreshOutcome, AuthError> {
        let _transition = self.transitions.lock().await;

        let token = {
            let session = self.session.borrow();
            if !session.is_authenticated() {
                return Ok(RefreshOutcome::Skipped);
            }
            session.access_token().map(str::to_owned)
        };
        let Some(token) = token else {
            return Ok(RefreshOutcome::Skipped);
        };

        let remaining = match token::time_to_expiry(&token, self.clock.now()) {
            Ok(remaining) => remaining,
            Err(err) => {
                return Err(self.force_logout(AuthError::TokenDecode(err.to_string())).await);
            }
        };

        if remaining > self.refresh_threshold {
            tracing::debug!(remaining_secs = remaining.num_seconds(), "refresh not due");
            return Ok(RefreshOutcome::NotDue { remaining });
        }

        let expires_at = self.exchange_refresh_token().await?;
        Ok(RefreshOutcome::Refreshed { expires_at })
    }

    /// Refresh now, regardless of remaining lifetime.
    pub async fn refresh(&self) -> Result<DateTime<Utc>, AuthError> {
        let _transition = self.transitions.lock().await;
        if !self.session.borrow().is_authenticated() {
            return Err(AuthError::MissingRefreshToken);
        }
        self.exchange_refresh_token().await
    }

    /// Force `Anonymous` if the current access token has expired.
    ///
    /// Never calls the backend. Returns whether the session was cleared.
    pub async fn check_expiry(&self) -> bool {
        let _transition = self.transitions.lock().await;

        let token = self.session.borrow().access_token().map(str::to_owned);
        let Some(token) = token else {
            return false;
        };
        if !token::is_expired(Some(&token), self.clock.now()) {
            return false;
        }

        tracing::info!("access token expired; clearing session");
        self.erase_persisted();
        self.session.send_modify(Session::destroy);
        true
    }

    // Caller holds the transition lock.
    async fn exchange_refresh_token(&self) -> Result<DateTime<Utc>, AuthError> {
        self.session.send_modify(|s| s.begin(AuthState::Refreshing));

        let refresh_token = self.session.borrow().refresh_token().map(str::to_owned);
        let Some(refresh_token) = refresh_token else {
            return Err(self.force_logout(AuthError::MissingRefreshToken).await);
        };

        let data = match self.backend.refresh(&refresh_token).await {
            Ok(envelope) => envelope.into_result(),
            Err(err) => Err(err.into()),
        };
        let data = match data {
            Ok(data) => data,
            Err(err) => return Err(self.force_logout(err).await),
        };

        let profile = self.session.borrow().profile().cloned();
        if let Some(profile) = profile {
            if let Err(err) = self.store.save(&data.access_token, &refresh_token, &profile) {
                tracing::warn!("failed to persist refreshed token: {err}");
            }
        }

        let expires_at = data.expires_at;
        self.session
            .send_modify(|s| s.replace_access_token(data.access_token, expires_at));
        tracing::info!(%expires_at, "access token refreshed");

        Ok(expires_at)
    }

    fn reject_login(&self, err: AuthError) -> AuthError {
        if self.session.borrow().access_token().is_some() {
            self.erase_persisted();
        }
        self.session.send_modify(|s| {
            s.destroy();
            s.record(err.clone());
        });

        if err.is_validation() {
            tracing::debug!(code = err.code(), "login rejected locally");
        } else {
            tracing::warn!(code = err.code(), "login failed: {err}");
        }
        err
    }

    // Refresh failure path: clear everything, then tell the backend (best effort).
    async fn force_logout(&self, err: AuthError) -> AuthError {
        tracing::warn!(code = err.code(), "silent refresh failed, signing out: {err}");

        self.erase_persisted();
        self.session.send_modify(|s| {
            s.destroy();
            s.record(err.clone());
        });

        if let Err(logout_err) = self.backend.logout().await {
            tracing::debug!("best-effort logout after refresh failure failed: {logout_err}");
        }
        err
    }

    fn erase_persisted(&self) {
        if let Err(err) = self.store.clear() {
            tracing::warn!("failed to erase persisted session: {err}");
        }
    }
}

fn rehydrate(store: &SessionStore, now: DateTime<Utc>) -> Session {
    let persisted = store.load();
    let mut session = Session::default();

    if let (Some(access_token), Some(profile)) = (persisted.access_token, persisted.profile) {
        if let Ok(claims) = token::decode(&access_token) {
            if !claims.is_expired_at(now) {
                tracing::info!(tenant_id = %profile.tenant_id, "session restored from storage");
                session.establish(
                    profile,
                    access_token,
                    persisted.refresh_token,
                    Some(claims.expires_at),
                );
                return session;
            }
        }
    }

    if let Err(err) = store.clear() {
        tracing::warn!("failed to erase stale persisted session: {err}");
    }
    session
}
