use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Watcher delivery and supervision parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Capacity of each watcher's delivery queue
    ///
    /// Delivery is bounded-blocking: once a watcher's queue is full, the emit
    /// for that kind waits until the consumer drains a slot (or the watcher
    /// is stopped). Other watchers of the same kind still receive the event
    /// immediately.
    ///
    /// The simulated workload is bursty but producer-paced, so the default
    /// is generous.
    ///
    /// **Default**: 100
    #[serde(default = "default_watcher_buffer_size")]
    pub watcher_buffer_size: usize,

    /// Period of the timeout supervisor's idle scan (milliseconds)
    ///
    /// This is the expiry granularity: an idle watcher is retired at most
    /// one interval after its timeout elapses.
    ///
    /// **Default**: 100
    #[serde(default = "default_supervisor_interval_in_ms")]
    pub supervisor_interval_in_ms: u64,

    /// Inactivity timeout applied to watches that do not carry their own
    /// (milliseconds). `0` disables it.
    ///
    /// **Default**: 0
    #[serde(default)]
    pub default_watch_timeout_in_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watcher_buffer_size: default_watcher_buffer_size(),
            supervisor_interval_in_ms: default_supervisor_interval_in_ms(),
            default_watch_timeout_in_ms: 0,
        }
    }
}

impl WatchConfig {
    /// Validates watch configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.watcher_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.watcher_buffer_size must be greater than 0".into(),
            )));
        }

        if self.watcher_buffer_size > 10_000 {
            warn!(
                "watch.watcher_buffer_size ({}) is very large; a stalled watcher may hold that many events",
                self.watcher_buffer_size
            );
        }

        if self.supervisor_interval_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch.supervisor_interval_in_ms cannot be 0".into(),
            )));
        }

        if self.default_watch_timeout_in_ms != 0
            && self.default_watch_timeout_in_ms < self.supervisor_interval_in_ms
        {
            warn!(
                "watch.default_watch_timeout_in_ms ({}) is shorter than the supervisor interval ({}ms); expiry will lag",
                self.default_watch_timeout_in_ms, self.supervisor_interval_in_ms
            );
        }

        Ok(())
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_interval_in_ms)
    }

    pub fn default_watch_timeout(&self) -> Option<Duration> {
        match self.default_watch_timeout_in_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

const fn default_watcher_buffer_size() -> usize {
    100
}

const fn default_supervisor_interval_in_ms() -> u64 {
    100
}
