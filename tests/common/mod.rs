//! Fixtures shared by the integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use watch_emulator::*;

/// Inactivity window of every test watcher
pub const WATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between emits, long enough for the consumer to catch up
pub const EMIT_SPACING: Duration = Duration::from_millis(10);

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub fn test_client() -> RestClient {
    let mut config = EmulatorConfig::default();
    config.watch.supervisor_interval_in_ms = 10;
    RestClient::new(config).expect("valid test config")
}

pub fn watch_options() -> WatchOptions {
    WatchOptions::new()
        .with_resource_version("0")
        .with_timeout(WATCH_TIMEOUT)
}

fn resources(pairs: &[(&str, &str)]) -> ResourceList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
}

pub fn pod() -> Pod {
    Pod {
        metadata: ObjectMeta::new("test", "pod1").with_resource_version("10"),
        spec: PodSpec {
            restart_policy: "Always".into(),
            dns_policy: "ClusterFirst".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn service() -> Service {
    Service {
        metadata: ObjectMeta::new("test", "service1").with_resource_version("12"),
        spec: ServiceSpec {
            session_affinity: "None".into(),
            service_type: ServiceType::ClusterIP,
            ..Default::default()
        },
    }
}

pub fn replication_controller() -> ReplicationController {
    ReplicationController {
        metadata: ObjectMeta::new("test", "replicationcontroller1").with_resource_version("18"),
        spec: ReplicationControllerSpec {
            replicas: 1,
            ..Default::default()
        },
    }
}

pub fn persistent_volume() -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta::new("test", "persistentvolume1").with_resource_version("18"),
        spec: PersistentVolumeSpec {
            capacity: resources(&[("storage", "10G")]),
            host_path: Some("/foo".into()),
            persistent_volume_reclaim_policy: "Retain".into(),
        },
        status: PersistentVolumeStatus {
            phase: "Pending".into(),
        },
    }
}

pub fn persistent_volume_claim() -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta::new("test", "persistentVolumeClaim1").with_resource_version("123"),
        spec: PersistentVolumeClaimSpec {
            volume_name: "volume".into(),
            ..Default::default()
        },
        status: PersistentVolumeClaimStatus {
            phase: "Pending".into(),
        },
    }
}

pub fn node() -> Node {
    Node {
        metadata: ObjectMeta::new("test", "node1").with_resource_version("123"),
        spec: NodeSpec {
            external_id: "ext".into(),
            unschedulable: false,
        },
        ..Default::default()
    }
}

/// The event sequence every kind is checked against
pub const SCENARIO: [EventType; 4] = [
    EventType::Modified,
    EventType::Added,
    EventType::Modified,
    EventType::Deleted,
];
