//! Watcher registry: one bucket per resource kind.
//!
//! Buckets live in a `DashMap` so unrelated kinds never contend. Inside a
//! bucket, membership changes (Watch, Stop, expiry, shutdown) are mutually
//! exclusive under the bucket's own mutex, and emission order is held by a
//! separate async lock that the broadcaster keeps across fan-out.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use super::watcher::CloseReason;
use super::watcher::WatchFilter;
use super::watcher::WatcherEntry;
use super::watcher::WatcherHandle;
use super::watcher::WatcherShared;
use crate::KindHandler;
use crate::ResourceKind;
use crate::WatchError;
use crate::WatchMetrics;
use crate::WatchOptions;

#[derive(Debug, Default)]
struct Members {
    /// Set once by shutdown; rejects any later registration
    closed: bool,
    watchers: HashMap<u64, WatcherEntry>,
}

/// All watchers of one kind, plus the kind's emission state
pub(crate) struct KindBucket {
    kind: ResourceKind,
    handler: Arc<dyn KindHandler>,
    members: Mutex<Members>,
    /// Last assigned order key. Held across fan-out to serialize emits;
    /// shared so the fan-out task can own the guard.
    emit_lock: Arc<tokio::sync::Mutex<u64>>,
    /// Mirror of `emit_lock` readable without waiting on an emit
    last_version: AtomicU64,
    metrics: Arc<WatchMetrics>,
}

impl std::fmt::Debug for KindBucket {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("KindBucket")
            .field("kind", &self.kind)
            .field("last_version", &self.last_version)
            .finish_non_exhaustive()
    }
}

impl KindBucket {
    fn new(
        handler: Arc<dyn KindHandler>,
        metrics: Arc<WatchMetrics>,
    ) -> Self {
        Self {
            kind: handler.kind(),
            handler,
            members: Mutex::new(Members::default()),
            emit_lock: Arc::new(tokio::sync::Mutex::new(0)),
            last_version: AtomicU64::new(0),
            metrics,
        }
    }

    pub(crate) fn handler(&self) -> &dyn KindHandler {
        self.handler.as_ref()
    }

    pub(crate) fn emit_lock(&self) -> &Arc<tokio::sync::Mutex<u64>> {
        &self.emit_lock
    }

    pub(crate) fn metrics(&self) -> &WatchMetrics {
        &self.metrics
    }

    pub(crate) fn publish_version(
        &self,
        version: u64,
    ) {
        self.last_version.store(version, Ordering::Release);
    }

    pub(crate) fn last_version(&self) -> u64 {
        self.last_version.load(Ordering::Acquire)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.members.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.members.lock().watchers.len()
    }

    fn insert(
        &self,
        entry: WatcherEntry,
    ) -> Result<(), WatchError> {
        let mut members = self.members.lock();
        if members.closed {
            return Err(WatchError::BroadcasterClosed);
        }
        members.watchers.insert(entry.shared().id(), entry);
        drop(members);

        self.metrics.watcher_added(self.kind);
        Ok(())
    }

    /// Current watchers, in no particular order
    pub(crate) fn snapshot(&self) -> Vec<WatcherEntry> {
        self.members.lock().watchers.values().cloned().collect()
    }

    /// Removes a watcher and starts its drain. No-op if it is already gone.
    pub(crate) fn deregister(
        &self,
        id: u64,
        reason: CloseReason,
    ) -> bool {
        let removed = self.members.lock().watchers.remove(&id);
        match removed {
            Some(entry) => {
                // the sender is dropped only after the reason is recorded
                entry.shared().begin_stop(reason);
                self.metrics.watcher_removed(self.kind);
                debug!(watcher_id = id, kind = %self.kind, ?reason, "Watcher deregistered");
                true
            }
            None => false,
        }
    }

    fn expire_idle(
        &self,
        now: Instant,
    ) -> usize {
        let expired: Vec<WatcherEntry> = {
            let mut members = self.members.lock();
            let ids: Vec<u64> = members
                .watchers
                .values()
                .filter(|w| w.shared().is_idle(now))
                .map(|w| w.shared().id())
                .collect();
            ids.iter().filter_map(|id| members.watchers.remove(id)).collect()
        };

        for entry in &expired {
            entry.shared().begin_stop(CloseReason::Expired);
            self.metrics.watcher_removed(self.kind);
            self.metrics.record_expired(self.kind);
            warn!(
                watcher_id = entry.shared().id(),
                kind = %self.kind,
                "Watcher expired after inactivity"
            );
        }
        expired.len()
    }

    fn close(&self) -> usize {
        let drained: Vec<WatcherEntry> = {
            let mut members = self.members.lock();
            members.closed = true;
            members.watchers.drain().map(|(_, w)| w).collect()
        };

        for entry in &drained {
            entry.shared().begin_stop(CloseReason::Shutdown);
            self.metrics.watcher_removed(self.kind);
        }
        drained.len()
    }
}

/// Per-instance registry of kind handlers and their watchers
#[derive(Debug)]
pub struct WatchRegistry {
    buckets: DashMap<ResourceKind, Arc<KindBucket>>,
    next_id: AtomicU64,
    /// Set by `close_all`; buckets registered afterwards start closed
    closed: AtomicBool,
    buffer_size: usize,
    default_timeout: Option<Duration>,
    metrics: Arc<WatchMetrics>,
}

impl WatchRegistry {
    pub fn new(
        buffer_size: usize,
        default_timeout: Option<Duration>,
        metrics: Arc<WatchMetrics>,
    ) -> Self {
        Self {
            buckets: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            buffer_size,
            default_timeout,
            metrics,
        }
    }

    /// Adds a route for a new kind.
    pub fn register_handler(
        &self,
        handler: Arc<dyn KindHandler>,
    ) -> Result<(), WatchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WatchError::BroadcasterClosed);
        }

        let kind = handler.kind();
        let bucket = match self.buckets.entry(kind) {
            Entry::Occupied(_) => return Err(WatchError::KindAlreadyRegistered(kind)),
            Entry::Vacant(slot) => {
                let bucket = Arc::new(KindBucket::new(handler, self.metrics.clone()));
                slot.insert(bucket.clone());
                bucket
            }
        };

        // close_all may have swept the buckets before this one was inserted
        if self.closed.load(Ordering::SeqCst) {
            bucket.close();
            return Err(WatchError::BroadcasterClosed);
        }

        debug!(%kind, "Resource kind registered");
        Ok(())
    }

    pub(crate) fn bucket(
        &self,
        kind: ResourceKind,
    ) -> Result<Arc<KindBucket>, WatchError> {
        self.buckets
            .get(&kind)
            .map(|b| b.value().clone())
            .ok_or(WatchError::UnsupportedKind(kind))
    }

    fn all_buckets(&self) -> Vec<Arc<KindBucket>> {
        self.buckets.iter().map(|b| b.value().clone()).collect()
    }

    /// Creates and registers a watcher receiving events emitted from now on.
    pub fn watch(
        &self,
        kind: ResourceKind,
        options: &WatchOptions,
    ) -> Result<WatcherHandle, WatchError> {
        let bucket = self.bucket(kind)?;
        let filter = WatchFilter::from_options(options)?;
        let timeout = options.timeout.or(self.default_timeout);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(WatcherShared::new(id, kind, filter, timeout));
        let (entry, receiver) = WatcherEntry::new(shared.clone(), self.buffer_size);

        bucket.insert(entry)?;

        debug!(
            watcher_id = id,
            %kind,
            buffer_size = self.buffer_size,
            ?timeout,
            "Watcher registered"
        );

        Ok(WatcherHandle::new(shared, receiver, bucket))
    }

    /// Retires every watcher idle past its timeout. Returns how many.
    pub fn expire_idle(
        &self,
        now: Instant,
    ) -> usize {
        self.all_buckets().iter().map(|b| b.expire_idle(now)).sum()
    }

    /// Closes every bucket and deregisters all watchers. Returns how many.
    pub fn close_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.all_buckets().iter().map(|b| b.close()).sum()
    }

    pub fn watcher_count(
        &self,
        kind: ResourceKind,
    ) -> usize {
        self.buckets.get(&kind).map(|b| b.len()).unwrap_or(0)
    }

    pub fn total_watcher_count(&self) -> usize {
        self.all_buckets().iter().map(|b| b.len()).sum()
    }

    /// Last order key assigned for `kind`, 0 before the first emit
    pub fn last_resource_version(
        &self,
        kind: ResourceKind,
    ) -> Option<u64> {
        self.buckets.get(&kind).map(|b| b.last_version())
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = self.buckets.iter().map(|b| *b.key()).collect();
        kinds.sort();
        kinds
    }
}
