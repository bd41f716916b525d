//! Per-instance watch metrics.
//!
//! Each client owns its own prometheus [`Registry`], so parallel simulation
//! runs in one process never mix their counts.


use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;

use crate::Error;
use crate::ResourceKind;
use crate::Result;

const KIND_LABEL: &str = "kind";

pub struct WatchMetrics {
    enabled: bool,
    registry: Registry,
    events_emitted: IntCounterVec,
    events_delivered: IntCounterVec,
    events_filtered: IntCounterVec,
    watchers_active: IntGaugeVec,
    watchers_expired: IntCounterVec,
}

impl std::fmt::Debug for WatchMetrics {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchMetrics").field("enabled", &self.enabled).finish()
    }
}

impl WatchMetrics {
    pub fn new(enabled: bool) -> Result<Self> {
        let events_emitted = IntCounterVec::new(
            Opts::new("watch_events_emitted_total", "Events accepted by the broadcaster"),
            &[KIND_LABEL],
        )?;
        let events_delivered = IntCounterVec::new(
            Opts::new(
                "watch_events_delivered_total",
                "Events admitted into watcher queues",
            ),
            &[KIND_LABEL],
        )?;
        let events_filtered = IntCounterVec::new(
            Opts::new(
                "watch_events_filtered_total",
                "Events skipped by watcher selectors or resume versions",
            ),
            &[KIND_LABEL],
        )?;
        let watchers_active = IntGaugeVec::new(
            Opts::new("watchers_active", "Registered watchers"),
            &[KIND_LABEL],
        )?;
        let watchers_expired = IntCounterVec::new(
            Opts::new(
                "watchers_expired_total",
                "Watchers retired by the timeout supervisor",
            ),
            &[KIND_LABEL],
        )?;

        let registry = Registry::new();
        registry.register(Box::new(events_emitted.clone()))?;
        registry.register(Box::new(events_delivered.clone()))?;
        registry.register(Box::new(events_filtered.clone()))?;
        registry.register(Box::new(watchers_active.clone()))?;
        registry.register(Box::new(watchers_expired.clone()))?;

        Ok(Self {
            enabled,
            registry,
            events_emitted,
            events_delivered,
            events_filtered,
            watchers_active,
            watchers_expired,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_emitted(
        &self,
        kind: ResourceKind,
    ) {
        if self.enabled {
            self.events_emitted.with_label_values(&[kind.as_str()]).inc();
        }
    }

    pub fn record_delivered(
        &self,
        kind: ResourceKind,
        count: usize,
    ) {
        if self.enabled && count > 0 {
            self.events_delivered
                .with_label_values(&[kind.as_str()])
                .inc_by(count as u64);
        }
    }

    pub fn record_filtered(
        &self,
        kind: ResourceKind,
        count: usize,
    ) {
        if self.enabled && count > 0 {
            self.events_filtered
                .with_label_values(&[kind.as_str()])
                .inc_by(count as u64);
        }
    }

    pub fn watcher_added(
        &self,
        kind: ResourceKind,
    ) {
        if self.enabled {
            self.watchers_active.with_label_values(&[kind.as_str()]).inc();
        }
    }

    pub fn watcher_removed(
        &self,
        kind: ResourceKind,
    ) {
        if self.enabled {
            self.watchers_active.with_label_values(&[kind.as_str()]).dec();
        }
    }

    pub fn record_expired(
        &self,
        kind: ResourceKind,
    ) {
        if self.enabled {
            self.watchers_expired.with_label_values(&[kind.as_str()]).inc();
        }
    }

    pub fn emitted_total(
        &self,
        kind: ResourceKind,
    ) -> u64 {
        self.events_emitted.with_label_values(&[kind.as_str()]).get()
    }

    pub fn delivered_total(
        &self,
        kind: ResourceKind,
    ) -> u64 {
        self.events_delivered.with_label_values(&[kind.as_str()]).get()
    }

    pub fn filtered_total(
        &self,
        kind: ResourceKind,
    ) -> u64 {
        self.events_filtered.with_label_values(&[kind.as_str()]).get()
    }

    pub fn active_watchers(
        &self,
        kind: ResourceKind,
    ) -> i64 {
        self.watchers_active.with_label_values(&[kind.as_str()]).get()
    }

    pub fn expired_total(
        &self,
        kind: ResourceKind,
    ) -> u64 {
        self.watchers_expired.with_label_values(&[kind.as_str()]).get()
    }

    /// Renders the prometheus text exposition format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Fatal(format!("metrics are not valid UTF-8: {e}")))
    }
}
