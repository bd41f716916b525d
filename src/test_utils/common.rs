use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::*;

pub(crate) const RECV_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) fn test_pod() -> Pod {
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

pub(crate) fn labeled_pod(
    name: &str,
    labels: &[(&str, &str)],
) -> Pod {
    let mut pod = test_pod();
    pod.metadata.name = name.to_string();
    pod.metadata.labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>();
    pod
}

pub(crate) fn test_service() -> Service {
    Service {
        metadata: ObjectMeta::new("test", "service1").with_resource_version("12"),
        spec: ServiceSpec {
            session_affinity: "None".into(),
            service_type: ServiceType::ClusterIP,
            ..Default::default()
        },
    }
}

pub(crate) fn test_node() -> Node {
    Node {
        metadata: ObjectMeta::new("test", "node1").with_resource_version("123"),
        spec: NodeSpec {
            external_id: "ext".into(),
            unschedulable: false,
        },
        ..Default::default()
    }
}

/// Client with a fast supervisor for tests
pub(crate) fn test_client() -> RestClient {
    let mut config = EmulatorConfig::default();
    config.watch.supervisor_interval_in_ms = 10;
    RestClient::new(config).unwrap()
}

/// Waits for the next event, failing the test instead of hanging
pub(crate) async fn next_event(handle: &mut WatcherHandle) -> Option<WatchEvent> {
    timeout(RECV_TIMEOUT, handle.next())
        .await
        .expect("timed out waiting for watch event")
}

/// True if no event arrives within `wait`
pub(crate) async fn stays_quiet(
    handle: &mut WatcherHandle,
    wait: Duration,
) -> bool {
    timeout(wait, handle.next()).await.is_err()
}

/// Registry with the built-in kinds plus a broadcaster over it, no supervisor
pub(crate) fn test_engine(buffer_size: usize) -> (Arc<WatchRegistry>, Broadcaster) {
    let metrics = Arc::new(WatchMetrics::new(true).unwrap());
    let registry = Arc::new(WatchRegistry::new(buffer_size, None, metrics));
    for handler in builtin_handlers() {
        registry.register_handler(handler).unwrap();
    }
    let broadcaster = Broadcaster::new(registry.clone());
    (registry, broadcaster)
}

pub(crate) fn shared<R: Resource>(object: R) -> ObjectRef {
    Arc::new(object)
}
