use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use ums_auth::{
    ApiEnvelope, AuthBackend, AuthError, AuthSessionManager, AuthState, BackendError,
    FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, LoginData, LoginRequest, LogoutData,
    MockAuthBackend, MockBackendConfig, RefreshData, RefreshOutcome, SessionConfig, SessionStore,
    SessionTimers, TokenCodec,
};
use ums_core::{Clock, ManualClock};

struct World {
    clock: ManualClock,
    backend: Arc<MockAuthBackend>,
    kv: Arc<dyn KeyValueStore>,
    config: SessionConfig,
}

impl World {
    fn new() -> Self {
        Self::with_store(Arc::new(InMemoryKeyValueStore::new()))
    }

    fn with_store(kv: Arc<dyn KeyValueStore>) -> Self {
        let clock = ManualClock::starting_now();
        let backend = Arc::new(MockAuthBackend::new(
            TokenCodec::new(b"lifecycle-secret"),
            Arc::new(clock.clone()),
            MockBackendConfig::default().without_latency(),
        ));
        Self {
            clock,
            backend,
            kv,
            config: SessionConfig::default(),
        }
    }

    /// A fresh manager over the same storage, as after an app restart.
    fn boot(&self) -> AuthSessionManager {
        AuthSessionManager::new(
            &self.config,
            self.backend.clone(),
            self.store(),
            Arc::new(self.clock.clone()),
        )
    }

    fn store(&self) -> SessionStore {
        SessionStore::new(self.kv.clone())
    }
}

fn alice() -> LoginRequest {
    LoginRequest::new("alice@acme.com", "secret")
}

#[tokio::test]
async fn login_persists_a_mirror_of_the_session() {
    let world = World::new();
    let manager = world.boot();

    let profile = manager.login(alice()).await.unwrap();

    let session = manager.snapshot();
    assert_eq!(session.state(), AuthState::Authenticated);
    assert!(session.is_authenticated());
    assert_eq!(session.profile(), Some(&profile));
    assert_eq!(profile.name, "alice");

    let persisted = world.store().load();
    assert_eq!(persisted.access_token.as_deref(), session.access_token());
    assert_eq!(persisted.refresh_token.as_deref(), session.refresh_token());
    assert_eq!(persisted.profile, Some(profile));
}

#[tokio::test]
async fn invalid_email_never_reaches_the_backend() {
    let world = World::new();
    let manager = world.boot();

    let err = manager
        .login(LoginRequest::new("not-an-email", "secret"))
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::InvalidEmail);
    assert_eq!(err.code(), "INVALID_EMAIL");
    assert_eq!(world.backend.calls().login, 0);
    assert_eq!(manager.state(), AuthState::Anonymous);
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn failed_login_over_a_live_session_signs_out() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();

    let err = manager
        .login(LoginRequest::new("alice@acme.com", "x"))
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::InvalidPassword);
    assert!(!manager.is_authenticated());
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn refresh_near_expiry_swaps_only_the_access_token() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();
    let before = manager.snapshot();

    world.clock.advance(Duration::minutes(56));
    let outcome = manager.refresh_if_due().await.unwrap();

    let after = manager.snapshot();
    assert_eq!(
        outcome,
        RefreshOutcome::Refreshed {
            expires_at: world.clock.now() + Duration::hours(1)
        }
    );
    assert_ne!(after.access_token(), before.access_token());
    assert_eq!(after.refresh_token(), before.refresh_token());
    assert_eq!(after.profile(), before.profile());
    assert_eq!(after.state(), AuthState::Authenticated);

    let persisted = world.store().load();
    assert_eq!(persisted.access_token.as_deref(), after.access_token());
    assert_eq!(persisted.refresh_token.as_deref(), before.refresh_token());
}

#[tokio::test]
async fn refresh_far_from_expiry_makes_no_backend_call() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();
    let token = manager.snapshot().access_token().map(str::to_owned);

    world.clock.advance(Duration::minutes(10));
    let outcome = manager.refresh_if_due().await.unwrap();

    assert!(matches!(outcome, RefreshOutcome::NotDue { .. }));
    assert_eq!(world.backend.calls().refresh, 0);
    assert_eq!(manager.snapshot().access_token().map(str::to_owned), token);
}

#[tokio::test]
async fn logout_clears_everything_even_when_backend_fails() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();
    world.backend.set_logout_failure(true);

    let err = manager.logout().await.unwrap_err();

    assert!(matches!(err, AuthError::Transport(_)));
    let session = manager.snapshot();
    assert_eq!(session.state(), AuthState::Anonymous);
    assert_eq!(session.access_token(), None);
    assert_eq!(session.error(), Some(&err));
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn logout_success_leaves_no_error() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();

    manager.logout().await.unwrap();

    assert_eq!(manager.state(), AuthState::Anonymous);
    assert_eq!(manager.snapshot().error(), None);
    assert_eq!(world.backend.calls().logout, 1);
}

#[tokio::test]
async fn restart_restores_a_valid_session() {
    let world = World::new();
    let original = {
        let manager = world.boot();
        manager.login(alice()).await.unwrap();
        manager.snapshot()
    };

    world.clock.advance(Duration::minutes(20));
    let restored = world.boot().snapshot();

    assert_eq!(restored.state(), AuthState::Authenticated);
    assert_eq!(restored.profile(), original.profile());
    assert_eq!(restored.access_token(), original.access_token());
    assert_eq!(restored.refresh_token(), original.refresh_token());
    assert_eq!(restored.expires_at(), original.expires_at());
    assert_eq!(world.backend.calls().login, 1);
}

#[tokio::test]
async fn restart_with_expired_token_erases_the_record() {
    let world = World::new();
    world.boot().login(alice()).await.unwrap();

    world.clock.advance(Duration::hours(1));
    let manager = world.boot();

    assert_eq!(manager.state(), AuthState::Anonymous);
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn restart_with_partial_record_erases_it() {
    let world = World::new();
    world.kv.set("ums_access_token", "not.a.jwt").unwrap();
    world.kv.set("ums_refresh_token", "refresh_orphan").unwrap();

    let manager = world.boot();

    assert!(!manager.is_authenticated());
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn file_backed_session_survives_restart() {
    let mut path = std::env::temp_dir();
    path.push(format!("ums-lifecycle-{}", uuid::Uuid::now_v7()));
    path.push("session.json");

    let world = World::with_store(Arc::new(FileKeyValueStore::open(&path)));
    world.boot().login(alice()).await.unwrap();

    let reopened = World {
        kv: Arc::new(FileKeyValueStore::open(&path)),
        ..world
    };
    assert!(reopened.boot().is_authenticated());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn expiry_check_signs_out_without_refreshing() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();

    world.clock.advance(Duration::minutes(61));

    assert!(manager.check_expiry().await);
    assert_eq!(manager.state(), AuthState::Anonymous);
    assert_eq!(world.backend.calls().refresh, 0);
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn refresh_that_wins_the_race_prevents_forced_logout() {
    let world = World::new();
    let manager = world.boot();
    manager.login(alice()).await.unwrap();

    // Old token has just expired; a refresh is already queued ahead of the check.
    world.clock.advance(Duration::hours(1));
    let (refreshed, expired) = tokio::join!(manager.refresh_if_due(), manager.check_expiry());

    assert!(matches!(refreshed, Ok(RefreshOutcome::Refreshed { .. })));
    assert!(!expired);
    assert!(manager.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn expiry_timer_signs_out_an_idle_session() {
    let mut world = World::new();
    world.config.refresh_check_every = std::time::Duration::from_secs(24 * 3600);
    let manager = Arc::new(world.boot());
    manager.login(alice()).await.unwrap();

    let timers = SessionTimers::start(manager.clone(), &world.config);
    // Let the start-up checks see a fresh token first.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    world.clock.advance(Duration::hours(2));
    tokio::time::sleep(std::time::Duration::from_secs(300)).await;

    assert_eq!(manager.state(), AuthState::Anonymous);
    assert_eq!(world.backend.calls().refresh, 0);
    timers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refresh_timer_keeps_session_alive() {
    let world = World::new();
    let manager = Arc::new(world.boot());
    manager.login(alice()).await.unwrap();

    let timers = SessionTimers::start(manager.clone(), &world.config);
    world.clock.advance(Duration::minutes(57));
    tokio::time::sleep(std::time::Duration::from_secs(61)).await;

    assert_eq!(world.backend.calls().refresh, 1);
    assert!(manager.is_authenticated());
    timers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timers_refresh_a_due_session_on_start() {
    let world = World::new();
    let manager = Arc::new(world.boot());
    manager.login(alice()).await.unwrap();
    world.clock.advance(Duration::minutes(58));

    let timers = SessionTimers::start(manager.clone(), &world.config);
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    assert_eq!(world.backend.calls().refresh, 1);
    assert!(manager.is_authenticated());
    timers.shutdown().await;
}

/// Backend whose replies are scripted per call; unscripted calls fall
/// through to the mock.
struct ScriptedBackend {
    inner: Arc<MockAuthBackend>,
    login: Mutex<Option<Result<ApiEnvelope<LoginData>, BackendError>>>,
    refresh: Mutex<Option<Result<ApiEnvelope<RefreshData>, BackendError>>>,
}

impl ScriptedBackend {
    fn over(inner: Arc<MockAuthBackend>) -> Self {
        Self {
            inner,
            login: Mutex::new(None),
            refresh: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn login(&self, request: &LoginRequest) -> Result<ApiEnvelope<LoginData>, BackendError> {
        let scripted = self.login.lock().unwrap().take();
        match scripted {
            Some(reply) => reply,
            None => self.inner.login(request).await,
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ApiEnvelope<RefreshData>, BackendError> {
        let scripted = self.refresh.lock().unwrap().take();
        match scripted {
            Some(reply) => reply,
            None => self.inner.refresh(refresh_token).await,
        }
    }

    async fn logout(&self) -> Result<ApiEnvelope<LogoutData>, BackendError> {
        self.inner.logout().await
    }
}

fn boot_scripted(world: &World, backend: Arc<ScriptedBackend>) -> AuthSessionManager {
    AuthSessionManager::new(
        &world.config,
        backend,
        world.store(),
        Arc::new(world.clock.clone()),
    )
}

#[tokio::test]
async fn backend_rejection_passes_its_message_through() {
    let world = World::new();
    let backend = Arc::new(ScriptedBackend::over(world.backend.clone()));
    *backend.login.lock().unwrap() = Some(Ok(ApiEnvelope::fail(
        "ACCOUNT_LOCKED",
        "Account locked after too many attempts",
    )));
    let manager = boot_scripted(&world, backend);

    let err = manager.login(alice()).await.unwrap_err();

    assert_eq!(
        err,
        AuthError::Rejected {
            code: "ACCOUNT_LOCKED".into(),
            message: "Account locked after too many attempts".into(),
        }
    );
    assert_eq!(err.to_string(), "Account locked after too many attempts");
    assert_eq!(manager.state(), AuthState::Anonymous);
    assert_eq!(manager.snapshot().error(), Some(&err));
    assert!(world.store().load().is_empty());
    assert_eq!(world.kv.get("ums_user"), None);
}

#[tokio::test]
async fn login_transport_failure_writes_nothing() {
    let world = World::new();
    let backend = Arc::new(ScriptedBackend::over(world.backend.clone()));
    *backend.login.lock().unwrap() = Some(Err(BackendError::Transport("connection reset".into())));
    let manager = boot_scripted(&world, backend);

    let err = manager.login(alice()).await.unwrap_err();

    assert!(matches!(err, AuthError::Transport(_)));
    assert_eq!(manager.state(), AuthState::Anonymous);
    assert!(world.store().load().is_empty());
}

#[tokio::test]
async fn refresh_transport_failure_signs_out() {
    let world = World::new();
    let backend = Arc::new(ScriptedBackend::over(world.backend.clone()));
    let manager = boot_scripted(&world, backend.clone());
    manager.login(alice()).await.unwrap();
    *backend.refresh.lock().unwrap() = Some(Err(BackendError::Transport("timed out".into())));

    world.clock.advance(Duration::minutes(56));
    let err = manager.refresh_if_due().await.unwrap_err();

    assert!(matches!(err, AuthError::Transport(_)));
    let session = manager.snapshot();
    assert_eq!(session.state(), AuthState::Anonymous);
    assert_eq!(session.access_token(), None);
    assert_eq!(session.error(), Some(&err));
    assert!(world.store().load().is_empty());
    assert_eq!(world.backend.calls().logout, 1);
}
