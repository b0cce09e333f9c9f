//! Background eviction of expired sessions

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::session::{SessionError, SessionStore};

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically sweeps expired entries out of a [`SessionStore`]
#[derive(Clone)]
pub struct SessionReaper {
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run a single sweep as of `now` (unix seconds)
    pub async fn run_once(&self, now: i64) -> Result<u64, SessionError> {
        let removed = self.store.sweep(now).await?;
        if removed > 0 {
            info!("Session sweep removed {} expired tokens", removed);
        } else {
            debug!("Session sweep found nothing to remove");
        }
        Ok(removed)
    }

    /// Start sweeping on a background task until the handle is stopped.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub fn spawn(self) -> ReaperHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Session reaper started, sweeping every {:?}", self.interval);
            let mut ticker = tokio::time::interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now().timestamp();
                        if let Err(e) = self.run_once(now).await {
                            error!("Session sweep failed: {}", e);
                        }
                    }
                    changed = stop_rx.changed() => {
                        // A dropped sender also means stop.
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Session reaper stopped");
        });

        ReaperHandle { stop_tx, task }
    }
}

/// Handle to a running reaper task
pub struct ReaperHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for its current sweep to finish
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Session reaper task failed: {}", e);
        }
    }
}
