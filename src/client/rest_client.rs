use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use crate::builtin_handlers;
use crate::Broadcaster;
use crate::EmulatorConfig;
use crate::EventType;
use crate::KindHandler;
use crate::Node;
use crate::ObjectRef;
use crate::PersistentVolume;
use crate::PersistentVolumeClaim;
use crate::Pod;
use crate::ReplicationController;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;
use crate::Service;
use crate::TimeoutSupervisor;
use crate::TypedHandler;
use crate::WatchError;
use crate::WatchMetrics;
use crate::WatchOptions;
use crate::WatchRegistry;
use crate::WatcherHandle;

/// Client-facing boundary of one emulator instance
///
/// Producers inject events through the `emit_*` operations; consumers open
/// watches with [`watch`](Self::watch). Each client owns its own registry,
/// broadcaster and supervisor, so several simulations can run side by side
/// in one process.
///
/// # Example
///
/// ```ignore
/// let client = RestClient::with_defaults()?;
/// let mut watcher = client.watch(ResourceKind::PODS, WatchOptions::new())?;
///
/// client.emit_pod_watch_event(EventType::Added, pod).await?;
/// let event = watcher.next().await.unwrap();
/// assert_eq!(event.event_type(), EventType::Added);
///
/// client.close().await;
/// assert!(watcher.next().await.is_none());
/// ```
pub struct RestClient {
    config: EmulatorConfig,
    registry: Arc<WatchRegistry>,
    broadcaster: Broadcaster,
    metrics: Arc<WatchMetrics>,
    closed: AtomicBool,
    supervisor_cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", &self.config)
            .field("closed", &self.closed)
            .field("kinds", &self.registry.kinds())
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Builds a client with the built-in kinds registered and starts the
    /// timeout supervisor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: EmulatorConfig) -> Result<Self> {
        let config = config.validate()?;

        let metrics = Arc::new(WatchMetrics::new(config.monitoring.metrics_enabled)?);
        let registry = Arc::new(WatchRegistry::new(
            config.watch.watcher_buffer_size,
            config.watch.default_watch_timeout(),
            metrics.clone(),
        ));
        for handler in builtin_handlers() {
            registry.register_handler(handler)?;
        }

        let supervisor_cancel = CancellationToken::new();
        let supervisor = TimeoutSupervisor::new(
            registry.clone(),
            config.watch.supervisor_interval(),
            supervisor_cancel.clone(),
        )
        .spawn();

        info!(kinds = ?registry.kinds(), "Watch emulator client started");

        Ok(Self {
            broadcaster: Broadcaster::new(registry.clone()),
            config,
            registry,
            metrics,
            closed: AtomicBool::new(false),
            supervisor_cancel,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EmulatorConfig::default())
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(WatchError::BroadcasterClosed.into());
        }
        Ok(())
    }

    //---------------------------------------------------------------------
    // Kind routes

    /// Registers a typed resource as a new watchable kind.
    pub fn register_kind<R: Resource>(&self) -> Result<()> {
        self.register_handler(TypedHandler::<R>::shared())
    }

    /// Registers a custom route for a new kind.
    pub fn register_handler(
        &self,
        handler: Arc<dyn KindHandler>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.registry.register_handler(handler)?;
        Ok(())
    }

    pub fn supported_kinds(&self) -> Vec<ResourceKind> {
        self.registry.kinds()
    }

    //---------------------------------------------------------------------
    // Consumers

    /// Opens a watch on `kind` delivering events emitted from now on.
    pub fn watch(
        &self,
        kind: ResourceKind,
        options: WatchOptions,
    ) -> Result<WatcherHandle> {
        self.ensure_open()?;
        Ok(self.registry.watch(kind, &options)?)
    }

    //---------------------------------------------------------------------
    // Producers

    /// Emits a type-erased payload for `kind`. Returns the event's order key.
    pub async fn emit_object(
        &self,
        kind: ResourceKind,
        event_type: EventType,
        object: ObjectRef,
    ) -> Result<u64> {
        Ok(self.broadcaster.emit(kind, event_type, object).await?)
    }

    /// Emits a typed resource for its own kind.
    pub async fn emit<R: Resource>(
        &self,
        event_type: EventType,
        object: impl Into<Arc<R>>,
    ) -> Result<u64> {
        let object: Arc<R> = object.into();
        self.emit_object(R::KIND, event_type, object).await
    }

    pub async fn emit_pod_watch_event(
        &self,
        event_type: EventType,
        pod: impl Into<Arc<Pod>>,
    ) -> Result<u64> {
        self.emit::<Pod>(event_type, pod).await
    }

    pub async fn emit_service_watch_event(
        &self,
        event_type: EventType,
        service: impl Into<Arc<Service>>,
    ) -> Result<u64> {
        self.emit::<Service>(event_type, service).await
    }

    pub async fn emit_replication_controller_watch_event(
        &self,
        event_type: EventType,
        rc: impl Into<Arc<ReplicationController>>,
    ) -> Result<u64> {
        self.emit::<ReplicationController>(event_type, rc).await
    }

    pub async fn emit_persistent_volume_watch_event(
        &self,
        event_type: EventType,
        pv: impl Into<Arc<PersistentVolume>>,
    ) -> Result<u64> {
        self.emit::<PersistentVolume>(event_type, pv).await
    }

    pub async fn emit_persistent_volume_claim_watch_event(
        &self,
        event_type: EventType,
        pvc: impl Into<Arc<PersistentVolumeClaim>>,
    ) -> Result<u64> {
        self.emit::<PersistentVolumeClaim>(event_type, pvc).await
    }

    pub async fn emit_node_watch_event(
        &self,
        event_type: EventType,
        node: impl Into<Arc<Node>>,
    ) -> Result<u64> {
        self.emit::<Node>(event_type, node).await
    }

    //---------------------------------------------------------------------
    // Introspection

    pub fn watcher_count(
        &self,
        kind: ResourceKind,
    ) -> usize {
        self.registry.watcher_count(kind)
    }

    /// Last order key assigned for `kind`; `None` for unsupported kinds
    pub fn last_resource_version(
        &self,
        kind: ResourceKind,
    ) -> Option<u64> {
        self.registry.last_resource_version(kind)
    }

    pub fn metrics(&self) -> &WatchMetrics {
        &self.metrics
    }

    /// Prometheus text exposition of this client's metrics
    pub fn gather_metrics(&self) -> Result<String> {
        self.metrics.gather()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    //---------------------------------------------------------------------
    // Lifecycle

    /// Terminates every outstanding watch and rejects further Watch/Emit.
    ///
    /// Idempotent. Watchers drain what was already queued, then report
    /// `None` from `next()`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let closed = self.broadcaster.shutdown();
        self.supervisor_cancel.cancel();

        let supervisor = self.supervisor.lock().take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                error!("timeout supervisor did not stop cleanly: {:?}", e);
            }
        }

        info!(watchers = closed, "Watch emulator client closed");
    }
}

impl Drop for RestClient {
    fn drop(&mut self) {
        self.supervisor_cancel.cancel();
        self.broadcaster.shutdown();
    }
}
