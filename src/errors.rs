//! Watch Emulator Error Hierarchy
//!
//! Every condition here is local and recoverable at the facade boundary.
//! Nothing in this module should ever bring the process down.

use config::ConfigError;

use crate::ResourceKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Watch/emit failures surfaced by the broadcaster and registry
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Metric registration or encoding failures
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// Broken internal invariant. Treat as a defect, not a runtime condition.
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Terminal errors will fail the same way on every retry.
    pub fn is_terminal(&self) -> bool {
        match self {
            Error::Watch(e) => e.is_terminal(),
            Error::Config(_) | Error::Fatal(_) => true,
            Error::Metrics(_) => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    /// Shortcut for matching on the inner watch error.
    pub fn as_watch_error(&self) -> Option<&WatchError> {
        match self {
            Error::Watch(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// No handler is registered for the kind
    #[error("Unsupported resource kind: {0}")]
    UnsupportedKind(ResourceKind),

    /// Emit or Watch after the facade was closed
    #[error("Broadcaster is closed")]
    BroadcasterClosed,

    /// Watcher was retired by the timeout supervisor
    #[error("Watcher {watcher_id} expired after inactivity")]
    WatcherExpired { watcher_id: u64 },

    /// Payload type does not belong to the kind it was emitted for
    #[error("Cannot emit {actual} as {kind}: expected {expected}")]
    PayloadMismatch {
        kind: ResourceKind,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Resource kind {0} is already registered")]
    KindAlreadyRegistered(ResourceKind),

    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid resource version {0:?}")]
    InvalidResourceVersion(String),

    /// The task delivering an event panicked or was aborted by the runtime
    #[error("Event fan-out failed: {0}")]
    FanOutFailed(String),
}

impl WatchError {
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// An expired watcher can simply be re-opened.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WatchError::WatcherExpired { .. })
    }
}
