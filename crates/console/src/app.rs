//! Wiring: configuration, storage, the mock auth backend, the session manager
//! and the seeded directory.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;

use ums_auth::{
    AuthSessionManager, AuthState, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore,
    LoginRequest, MockAuthBackend, MockBackendConfig, RefreshOutcome, Session, SessionConfig,
    SessionStore, SessionTimers, TokenCodec,
};
use ums_core::{Clock, SystemClock, TenantId};
use ums_directory::Directory;

use crate::command::{Command, RecordKind};

pub struct App {
    config: SessionConfig,
    directory: Directory,
    manager: Arc<AuthSessionManager>,
}

#[derive(Debug, Serialize)]
struct StatusView {
    state: String,
    authenticated: bool,
    user: Option<String>,
    email: Option<String>,
    tenant: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl App {
    /// Production wiring: system clock, file-backed session unless
    /// `in_memory` is set.
    pub fn build(config: SessionConfig, in_memory: bool) -> anyhow::Result<Self> {
        let kv: Arc<dyn KeyValueStore> = if in_memory {
            Arc::new(InMemoryKeyValueStore::new())
        } else {
            let path = match &config.storage_path {
                Some(path) => path.clone(),
                None => FileKeyValueStore::default_path()?,
            };
            tracing::debug!(path = %path.display(), "using session file");
            Arc::new(FileKeyValueStore::open(path))
        };

        Self::with_store(config, kv, Arc::new(SystemClock))
    }

    pub fn with_store(
        config: SessionConfig,
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let directory = Directory::seeded_with(clock.clone())?;
        let home = directory
            .tenants()
            .list()
            .into_iter()
            .next()
            .context("seeded directory has no tenants")?;
        let home_org = directory
            .organizations
            .list(home.id)
            .first()
            .map(|org| org.id)
            .unwrap_or_default();

        let mut backend_config = MockBackendConfig {
            default_tenant: home.id,
            default_organization: home_org,
            access_token_ttl: config.access_token_ttl,
            ..Default::default()
        };
        if !config.simulate_latency {
            backend_config = backend_config.without_latency();
        }

        let backend = Arc::new(MockAuthBackend::new(
            TokenCodec::new(config.token_secret.as_bytes()),
            clock.clone(),
            backend_config,
        ));
        let manager = Arc::new(AuthSessionManager::new(
            &config,
            backend,
            SessionStore::new(kv),
            clock,
        ));

        Ok(Self {
            config,
            directory,
            manager,
        })
    }

    pub fn manager(&self) -> &Arc<AuthSessionManager> {
        &self.manager
    }

    pub async fn execute(&self, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
        match command {
            Command::Login {
                email,
                password,
                tenant,
            } => {
                let mut request = LoginRequest::new(email, password);
                if let Some(tenant) = tenant {
                    request = request.for_tenant(self.resolve_tenant(&tenant)?);
                }
                let profile = self.manager.login(request).await?;
                writeln!(out, "signed in as {} <{}>", profile.name, profile.email)?;
                self.write_status(out)?;
            }
            Command::Status => self.write_status(out)?,
            Command::Refresh => match self.manager.refresh_if_due().await? {
                RefreshOutcome::Skipped => writeln!(out, "not signed in")?,
                RefreshOutcome::NotDue { remaining } => {
                    writeln!(out, "token valid for another {}s", remaining.num_seconds())?
                }
                RefreshOutcome::Refreshed { expires_at } => {
                    writeln!(out, "token refreshed, expires at {expires_at}")?
                }
            },
            Command::Logout => match self.manager.logout().await {
                Ok(()) => writeln!(out, "signed out")?,
                Err(err) => writeln!(out, "signed out locally; backend reported: {err}")?,
            },
            Command::Tenants => {
                let tenants = self.directory.tenants().list();
                writeln!(out, "{}", serde_json::to_string_pretty(&tenants)?)?;
            }
            Command::List { kind } => {
                let tenant = self.manager.active_tenant().context("not signed in")?;
                let json = match kind {
                    RecordKind::Organizations => {
                        serde_json::to_string_pretty(&self.directory.organizations.list(tenant))?
                    }
                    RecordKind::Users => {
                        serde_json::to_string_pretty(&self.directory.users.list(tenant))?
                    }
                    RecordKind::Roles => {
                        serde_json::to_string_pretty(&self.directory.roles.list(tenant))?
                    }
                    RecordKind::Privileges => {
                        serde_json::to_string_pretty(&self.directory.privileges.list(tenant))?
                    }
                    RecordKind::LegalEntities => {
                        serde_json::to_string_pretty(&self.directory.legal_entities.list(tenant))?
                    }
                };
                writeln!(out, "{json}")?;
            }
            Command::Run { secs } => self.run(Duration::from_secs(secs), out).await?,
        }
        Ok(())
    }

    /// Drive the timers until `duration` elapses or Ctrl-C, printing every
    /// state change.
    async fn run(&self, duration: Duration, out: &mut impl Write) -> anyhow::Result<()> {
        if !self.manager.is_authenticated() {
            bail!("not signed in");
        }

        let timers = SessionTimers::start(self.manager.clone(), &self.config);
        let mut changes = self.manager.subscribe();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = changes.borrow_and_update().state();
                    writeln!(out, "session {state}")?;
                    if state == AuthState::Anonymous {
                        break;
                    }
                }
            }
        }

        timers.shutdown().await;
        Ok(())
    }

    fn resolve_tenant(&self, raw: &str) -> anyhow::Result<TenantId> {
        if let Ok(id) = raw.parse::<TenantId>() {
            return Ok(self.directory.tenants().get(id)?.id);
        }
        self.directory
            .tenants()
            .list()
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(raw))
            .map(|t| t.id)
            .with_context(|| format!("unknown tenant {raw:?}"))
    }

    fn status(&self, session: &Session) -> StatusView {
        let profile = session.profile();
        StatusView {
            state: session.state().to_string(),
            authenticated: session.is_authenticated(),
            user: profile.map(|p| p.name.clone()),
            email: profile.map(|p| p.email.clone()),
            tenant: session.active_tenant().map(|id| {
                self.directory
                    .tenants()
                    .get(id)
                    .map(|t| t.name)
                    .unwrap_or_else(|_| id.to_string())
            }),
            expires_at: session.expires_at(),
            error: session.error().map(|e| e.to_string()),
        }
    }

    fn write_status(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let view = self.status(&self.manager.snapshot());
        writeln!(out, "{}", serde_json::to_string_pretty(&view)?)?;
        Ok(())
    }
}
