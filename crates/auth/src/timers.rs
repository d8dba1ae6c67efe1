//! Background checks driving silent refresh and expiry enforcement.
//!
//! Two independent tickers share one [`AuthSessionManager`]:
//! the refresh check (default every minute) and the expiry check (default
//! every five minutes). Both stop when [`SessionTimers::shutdown`] is called
//! or the handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{AuthSessionManager, RefreshOutcome, SessionConfig};

pub struct SessionTimers {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SessionTimers {
    /// Spawn both checks on the current runtime.
    ///
    /// Each check runs once right away, then every period.
    pub fn start(manager: Arc<AuthSessionManager>, config: &SessionConfig) -> Self {
        let (shutdown, stop) = watch::channel(false);

        let refresh = tokio::spawn(refresh_loop(
            manager.clone(),
            config.refresh_check_every,
            stop.clone(),
        ));
        let expiry = tokio::spawn(expiry_loop(manager, config.expiry_check_every, stop));

        tracing::debug!(
            refresh_every_secs = config.refresh_check_every.as_secs(),
            expiry_every_secs = config.expiry_check_every.as_secs(),
            "session timers started"
        );

        Self {
            shutdown,
            handles: vec![refresh, expiry],
        }
    }

    /// Signal both loops and wait for them to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::warn!("session timer task ended abnormally: {err}");
            }
        }
        tracing::debug!("session timers stopped");
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn refresh_loop(
    manager: Arc<AuthSessionManager>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {
                if !manager.is_authenticated() {
                    continue;
                }
                match manager.refresh_if_due().await {
                    Ok(RefreshOutcome::Refreshed { expires_at }) => {
                        tracing::debug!(%expires_at, "silent refresh completed");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(code = err.code(), "silent refresh failed: {err}"),
                }
            }
        }
    }
}

async fn expiry_loop(
    manager: Arc<AuthSessionManager>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {
                if manager.check_expiry().await {
                    tracing::info!("session expired; signed out");
                }
            }
        }
    }
}
