use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::watcher::Delivery;
use crate::EventType;
use crate::ObjectRef;
use crate::ResourceKind;
use crate::WatchError;
use crate::WatchEvent;
use crate::WatchRegistry;

/// Serializing core of the watch engine
///
/// Emits for one kind are totally ordered: the kind's emit lock is held from
/// order-key assignment until every current watcher has either admitted the
/// event or left. Dropping an `emit` future after the key is assigned does
/// not cut the fan-out short. Fan-out runs one enqueue per watcher concurrently, so a
/// full queue delays only the next emit of that kind, never the delivery of
/// this event to the other watchers.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<WatchRegistry>,
    closed: AtomicBool,
}

impl Broadcaster {
    pub fn new(registry: Arc<WatchRegistry>) -> Self {
        Self {
            registry,
            closed: AtomicBool::new(false),
        }
    }

    /// Broadcasts one change to every watcher of `kind`.
    ///
    /// Returns the order key assigned to the event, or `BroadcasterClosed`
    /// if shutdown released a watcher before the event reached it.
    pub async fn emit(
        &self,
        kind: ResourceKind,
        event_type: EventType,
        object: ObjectRef,
    ) -> Result<u64, WatchError> {
        if self.is_closed() {
            return Err(WatchError::BroadcasterClosed);
        }

        let bucket = self.registry.bucket(kind).inspect_err(|_| {
            warn!(%kind, "Unsupported resource kind, event not emitted");
        })?;
        bucket.handler().admit(&*object)?;

        let mut last_version = bucket.emit_lock().clone().lock_owned().await;
        // shutdown may have closed the bucket while we waited
        if bucket.is_closed() {
            return Err(WatchError::BroadcasterClosed);
        }

        *last_version += 1;
        let version = *last_version;
        bucket.publish_version(version);
        let event = WatchEvent::new(kind, event_type, object, version);

        // Once an order key is assigned the fan-out must run to completion,
        // even if the caller stops polling: the task owns the emit guard, so
        // the next emit of this kind waits until every watcher has either
        // admitted this event or left.
        let fan_out = tokio::spawn(async move {
            let targets = bucket.snapshot();
            let outcomes = join_all(targets.iter().map(|w| w.enqueue(event.clone()))).await;

            let delivered = outcomes.iter().filter(|d| **d == Delivery::Delivered).count();
            let filtered = outcomes.iter().filter(|d| **d == Delivery::Filtered).count();
            let dropped = outcomes.len() - delivered - filtered;

            let metrics = bucket.metrics();
            metrics.record_emitted(kind);
            metrics.record_delivered(kind, delivered);
            metrics.record_filtered(kind, filtered);

            trace!(
                %kind,
                %event_type,
                resource_version = version,
                watchers = targets.len(),
                delivered,
                filtered,
                "Event broadcast"
            );

            // shutdown released watchers this event never reached
            let interrupted = dropped > 0 && bucket.is_closed();
            drop(last_version);
            interrupted
        });

        match fan_out.await {
            Ok(false) => Ok(version),
            Ok(true) => {
                debug!(%kind, resource_version = version, "Emit interrupted by shutdown");
                Err(WatchError::BroadcasterClosed)
            }
            Err(e) => {
                error!(%kind, resource_version = version, "Event fan-out task failed: {:?}", e);
                Err(WatchError::FanOutFailed(e.to_string()))
            }
        }
    }

    /// Stops accepting emits and closes every watcher. Idempotent.
    ///
    /// Returns the number of watchers closed by this call.
    pub fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let closed = self.registry.close_all();
        info!(watchers = closed, "Broadcaster shut down");
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
