//! Watcher: one subscriber's bounded delivery queue plus its lifecycle.
//!
//! The queue is a bounded `tokio::sync::mpsc` channel. The registry owns the
//! only long-lived sender; the consumer owns the receiver through
//! [`WatcherHandle`]. Closing is always drain-then-close: deregistration
//! drops the sender, the consumer keeps reading what was already admitted,
//! and `next()` reports `None` only once the queue is empty.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::registry::KindBucket;
use crate::FieldSelector;
use crate::LabelSelector;
use crate::ResourceKind;
use crate::WatchError;
use crate::WatchEvent;
use crate::WatchOptions;

/// Lifecycle of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Registered, receiving events
    Active,
    /// Deregistered, consumer still draining
    Stopping,
    /// Drained; `next()` returns `None`
    Closed,
}

/// Why a watcher left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Consumer called `stop()`
    Stopped,
    /// Retired by the timeout supervisor
    Expired,
    /// Client was closed
    Shutdown,
    /// Handle was dropped without `stop()`
    Dropped,
}

/// Per-watcher admission filter, fixed at Watch time
#[derive(Debug)]
pub(crate) struct WatchFilter {
    start_version: Option<u64>,
    labels: LabelSelector,
    fields: FieldSelector,
}

impl WatchFilter {
    pub(crate) fn from_options(options: &WatchOptions) -> Result<Self, WatchError> {
        Ok(Self {
            start_version: options.start_version()?,
            labels: options.label_selector.clone(),
            fields: options.field_selector.clone(),
        })
    }

    fn accepts(
        &self,
        event: &WatchEvent,
    ) -> bool {
        if let Some(start) = self.start_version {
            if event.resource_version() <= start {
                return false;
            }
        }
        let meta = event.object().meta();
        self.labels.matches(&meta.labels) && self.fields.matches(meta)
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: WatcherState,
    reason: Option<CloseReason>,
    last_activity: Instant,
}

/// State shared between the registry entry and the consumer handle
#[derive(Debug)]
pub(crate) struct WatcherShared {
    id: u64,
    kind: ResourceKind,
    filter: WatchFilter,
    timeout: Option<Duration>,
    lifecycle: Mutex<Lifecycle>,
    /// Aborts any enqueue blocked on a full queue once the watcher stops
    cancel: CancellationToken,
}

impl WatcherShared {
    pub(crate) fn new(
        id: u64,
        kind: ResourceKind,
        filter: WatchFilter,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            kind,
            filter,
            timeout,
            lifecycle: Mutex::new(Lifecycle {
                state: WatcherState::Active,
                reason: None,
                last_activity: Instant::now(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn touch(&self) {
        self.lifecycle.lock().last_activity = Instant::now();
    }

    /// True once an active watcher has gone `timeout` without a delivery.
    pub(crate) fn is_idle(
        &self,
        now: Instant,
    ) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        let lifecycle = self.lifecycle.lock();
        lifecycle.state == WatcherState::Active
            && now.saturating_duration_since(lifecycle.last_activity) >= timeout
    }

    /// Active -> Stopping. Returns false if the watcher was already stopping.
    pub(crate) fn begin_stop(
        &self,
        reason: CloseReason,
    ) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != WatcherState::Active {
                return false;
            }
            lifecycle.state = WatcherState::Stopping;
            lifecycle.reason = Some(reason);
        }
        self.cancel.cancel();
        true
    }

    fn mark_closed(&self) {
        self.lifecycle.lock().state = WatcherState::Closed;
    }

    fn state(&self) -> WatcherState {
        self.lifecycle.lock().state
    }

    fn reason(&self) -> Option<CloseReason> {
        self.lifecycle.lock().reason
    }
}

/// Outcome of handing one event to one watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Filtered,
    Closed,
}

/// Registry side of a watcher: the producer end of its queue
#[derive(Debug, Clone)]
pub(crate) struct WatcherEntry {
    shared: Arc<WatcherShared>,
    sender: mpsc::Sender<WatchEvent>,
}

impl WatcherEntry {
    pub(crate) fn new(
        shared: Arc<WatcherShared>,
        buffer_size: usize,
    ) -> (Self, mpsc::Receiver<WatchEvent>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (Self { shared, sender }, receiver)
    }

    pub(crate) fn shared(&self) -> &Arc<WatcherShared> {
        &self.shared
    }

    /// Admits `event` into the queue, waiting for space when it is full.
    ///
    /// Gives up without delivering once the watcher is stopped, so a
    /// consumer that stopped reading never wedges the emit path.
    pub(crate) async fn enqueue(
        &self,
        event: WatchEvent,
    ) -> Delivery {
        if !self.shared.filter.accepts(&event) {
            return Delivery::Filtered;
        }

        let version = event.resource_version();
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Delivery::Closed,
            sent = self.sender.send(event) => match sent {
                Ok(()) => {
                    self.shared.touch();
                    trace!(
                        watcher_id = self.shared.id,
                        kind = %self.shared.kind,
                        resource_version = version,
                        "Event enqueued"
                    );
                    Delivery::Delivered
                }
                Err(_) => Delivery::Closed,
            },
        }
    }
}

/// Consumer handle returned by Watch
///
/// Dropping the handle deregisters the watcher.
pub struct WatcherHandle {
    shared: Arc<WatcherShared>,
    receiver: mpsc::Receiver<WatchEvent>,
    bucket: Arc<KindBucket>,
}

impl WatcherHandle {
    pub(crate) fn new(
        shared: Arc<WatcherShared>,
        receiver: mpsc::Receiver<WatchEvent>,
        bucket: Arc<KindBucket>,
    ) -> Self {
        Self {
            shared,
            receiver,
            bucket,
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.shared.kind
    }

    pub fn state(&self) -> WatcherState {
        self.shared.state()
    }

    /// `None` while the watcher is active
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.reason()
    }

    /// Error describing an involuntary close, if any
    pub fn termination_error(&self) -> Option<WatchError> {
        match self.close_reason()? {
            CloseReason::Expired => Some(WatchError::WatcherExpired {
                watcher_id: self.shared.id,
            }),
            CloseReason::Shutdown => Some(WatchError::BroadcasterClosed),
            CloseReason::Stopped | CloseReason::Dropped => None,
        }
    }

    /// Next event in emission order.
    ///
    /// Waits while the queue is empty and the watcher is registered. Returns
    /// `None` once the watcher is deregistered and everything admitted
    /// before that has been read.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        match self.receiver.recv().await {
            Some(event) => Some(event),
            None => {
                self.shared.mark_closed();
                None
            }
        }
    }

    /// Stops watching. Events already queued stay readable through `next()`.
    pub fn stop(&mut self) {
        self.bucket.deregister(self.shared.id, CloseReason::Stopped);
        self.receiver.close();
    }

    /// Consumes the handle as a stream ending when the watcher closes
    pub fn into_stream(self) -> impl Stream<Item = WatchEvent> + Send {
        futures::stream::unfold(self, |mut handle| async move {
            let event = handle.next().await?;
            Some((event, handle))
        })
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("id", &self.shared.id)
            .field("kind", &self.shared.kind)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.bucket.deregister(self.shared.id, CloseReason::Dropped);
    }
}
