use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Shortest period a ticker runs at; shorter requests are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periodic clock that calls a tick closure on a background task.
///
/// The closure runs on the ticker's task, so it must be short and must not
/// block on I/O it does not own. Stopping waits for an in-flight tick to
/// return before the task is released.
pub struct Ticker {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start ticking every `period`, at least [`MIN_PERIOD`]. Must be called
    /// from within a Tokio runtime.
    pub fn spawn<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        if period < MIN_PERIOD {
            warn!(period_ms = period.as_millis() as u64, "clock period too short, using 1ms");
        }
        let period = period.max(MIN_PERIOD);
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "clock started");
            let mut interval = tokio::time::interval(period);
            // A slow tick delays the next one instead of bursting to catch up.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => tick(),
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("clock stopping");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signal the task to stop and wait for it. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("clock task ended abnormally: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // Without an await point we can only signal; the task exits on its next poll.
        let _ = self.shutdown_tx.send(true);
    }
}
