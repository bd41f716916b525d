use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::WatchRegistry;

/// Background task retiring watchers idle past their timeout
///
/// Expiry goes through the same deregistration path as `stop()`, so queued
/// events are still drained by the consumer. The scan period bounds how late
/// an expiry can be.
pub struct TimeoutSupervisor {
    registry: Arc<WatchRegistry>,
    interval: Duration,
    cancel: CancellationToken,
}

impl TimeoutSupervisor {
    pub fn new(
        registry: Arc<WatchRegistry>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            interval,
            cancel,
        }
    }

    /// One scan over every bucket. Returns the number of expired watchers.
    pub fn sweep(&self) -> usize {
        self.registry.expire_idle(Instant::now())
    }

    /// Spawns [`run`](Self::run) on the current Tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Scans until the cancellation token fires.
    pub async fn run(self) {
        info!(interval = ?self.interval, "Timeout supervisor started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Timeout supervisor received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = self.sweep();
                    if expired > 0 {
                        debug!(expired, "Timeout supervisor retired idle watchers");
                    }
                }
            }
        }

        info!("Timeout supervisor stopped");
    }
}
