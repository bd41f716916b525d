use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::*;
use crate::*;

#[derive(Debug, Clone, PartialEq)]
struct ConfigMap {
    metadata: ObjectMeta,
    data: std::collections::BTreeMap<String, String>,
}

impl Resource for ConfigMap {
    const KIND: ResourceKind = ResourceKind::new("configmaps");

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

fn config_map() -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta::new("test", "settings"),
        data: [("level".to_string(), "debug".to_string())].into(),
    }
}

#[tokio::test]
async fn test_pod_watch_scenario() {
    let client = test_client();
    let mut watcher = client.watch(ResourceKind::PODS, WatchOptions::new()).unwrap();
    let pod = test_pod();

    client
        .emit_pod_watch_event(EventType::Modified, pod.clone())
        .await
        .unwrap();
    client
        .emit_pod_watch_event(EventType::Added, pod.clone())
        .await
        .unwrap();

    let consumer = tokio::spawn(async move {
        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(next_event(&mut watcher).await.unwrap());
        }
        (events, watcher)
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    client
        .emit_pod_watch_event(EventType::Modified, pod.clone())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    client
        .emit_pod_watch_event(EventType::Deleted, pod.clone())
        .await
        .unwrap();

    let (events, mut watcher) = consumer.await.unwrap();
    let types: Vec<EventType> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            EventType::Modified,
            EventType::Added,
            EventType::Modified,
            EventType::Deleted
        ]
    );
    assert!(events.iter().all(|e| e.kind() == ResourceKind::PODS));
    assert!(events.iter().all(|e| e.object_as::<Pod>() == Some(&pod)));

    client.close().await;
    assert!(next_event(&mut watcher).await.is_none());
    assert_eq!(watcher.close_reason(), Some(CloseReason::Shutdown));
}

#[tokio::test]
async fn test_close_is_idempotent_and_rejects_further_use() {
    let client = test_client();

    client.close().await;
    client.close().await;
    assert!(client.is_closed());

    let err = client
        .watch(ResourceKind::PODS, WatchOptions::new())
        .unwrap_err();
    assert_eq!(err.as_watch_error(), Some(&WatchError::BroadcasterClosed));
    assert!(err.is_terminal());

    let err = client
        .emit_pod_watch_event(EventType::Added, test_pod())
        .await
        .unwrap_err();
    assert_eq!(err.as_watch_error(), Some(&WatchError::BroadcasterClosed));

    let err = client.register_kind::<ConfigMap>().unwrap_err();
    assert_eq!(err.as_watch_error(), Some(&WatchError::BroadcasterClosed));
}

#[tokio::test]
async fn test_close_lets_watchers_drain() {
    let client = test_client();
    let mut services = client
        .watch(ResourceKind::SERVICES, WatchOptions::new())
        .unwrap();
    let mut nodes = client.watch(ResourceKind::NODES, WatchOptions::new()).unwrap();

    client
        .emit_service_watch_event(EventType::Added, test_service())
        .await
        .unwrap();
    client.close().await;

    assert_eq!(
        next_event(&mut services).await.unwrap().event_type(),
        EventType::Added
    );
    assert!(next_event(&mut services).await.is_none());
    assert!(next_event(&mut nodes).await.is_none());
    assert_eq!(
        nodes.termination_error(),
        Some(WatchError::BroadcasterClosed)
    );
}

#[tokio::test]
async fn test_register_custom_kind() {
    let client = test_client();
    client.register_kind::<ConfigMap>().unwrap();
    assert!(client
        .supported_kinds()
        .contains(&ResourceKind::new("configmaps")));

    let mut watcher = client.watch(ConfigMap::KIND, WatchOptions::new()).unwrap();
    let version = client.emit::<ConfigMap>(EventType::Added, config_map()).await.unwrap();
    assert_eq!(version, 1);

    let event = next_event(&mut watcher).await.unwrap();
    let received = event.object_as::<ConfigMap>().unwrap();
    assert_eq!(received.data.get("level").map(String::as_str), Some("debug"));

    let err = client.register_kind::<ConfigMap>().unwrap_err();
    assert_eq!(
        err.as_watch_error(),
        Some(&WatchError::KindAlreadyRegistered(ConfigMap::KIND))
    );
}

#[tokio::test]
async fn test_unregistered_custom_kind_is_unsupported() {
    let client = test_client();

    let err = client.emit::<ConfigMap>(EventType::Added, config_map()).await.unwrap_err();
    assert_eq!(
        err.as_watch_error(),
        Some(&WatchError::UnsupportedKind(ConfigMap::KIND))
    );
    assert!(err.is_terminal());
    assert_eq!(client.last_resource_version(ConfigMap::KIND), None);
}

#[tokio::test]
async fn test_emit_object_checks_payload_type() {
    let client = test_client();
    let node: ObjectRef = Arc::new(test_node());

    let err = client
        .emit_object(ResourceKind::SERVICES, EventType::Added, node.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_watch_error(),
        Some(WatchError::PayloadMismatch { .. })
    ));

    let version = client
        .emit_object(ResourceKind::NODES, EventType::Added, node)
        .await
        .unwrap();
    assert_eq!(version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_configured_default_timeout_expires_watchers() {
    let mut config = EmulatorConfig::default();
    config.watch.supervisor_interval_in_ms = 10;
    config.watch.default_watch_timeout_in_ms = 100;
    let client = RestClient::new(config).unwrap();

    let mut watcher = client.watch(ResourceKind::PODS, WatchOptions::new()).unwrap();
    assert!(watcher.next().await.is_none());
    assert_eq!(watcher.close_reason(), Some(CloseReason::Expired));
    assert_eq!(client.metrics().expired_total(ResourceKind::PODS), 1);

    client.close().await;
}

#[tokio::test]
async fn test_order_keys_are_independent_per_kind() {
    let client = test_client();

    client
        .emit_pod_watch_event(EventType::Added, test_pod())
        .await
        .unwrap();
    client
        .emit_pod_watch_event(EventType::Deleted, test_pod())
        .await
        .unwrap();
    client
        .emit_node_watch_event(EventType::Added, test_node())
        .await
        .unwrap();

    assert_eq!(client.last_resource_version(ResourceKind::PODS), Some(2));
    assert_eq!(client.last_resource_version(ResourceKind::NODES), Some(1));
    assert_eq!(client.last_resource_version(ResourceKind::SERVICES), Some(0));
}

#[tokio::test]
async fn test_metrics_are_exposed_per_client() {
    let a = test_client();
    let b = test_client();
    let _watcher = a.watch(ResourceKind::PODS, WatchOptions::new()).unwrap();

    a.emit_pod_watch_event(EventType::Added, test_pod())
        .await
        .unwrap();

    assert_eq!(a.watcher_count(ResourceKind::PODS), 1);
    assert_eq!(b.watcher_count(ResourceKind::PODS), 0);
    assert_eq!(a.metrics().delivered_total(ResourceKind::PODS), 1);
    assert_eq!(b.metrics().emitted_total(ResourceKind::PODS), 0);

    let text = a.gather_metrics().unwrap();
    assert!(text.contains("watch_events_emitted_total{kind=\"pods\"} 1"));
    assert!(text.contains("watchers_active{kind=\"pods\"} 1"));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = EmulatorConfig::default();
    config.watch.watcher_buffer_size = 0;

    let err = RestClient::new(config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_invalid_watch_options_are_reported() {
    let client = test_client();

    let err = client
        .watch(
            ResourceKind::PODS,
            WatchOptions::new().with_resource_version("not-a-number"),
        )
        .unwrap_err();
    assert_eq!(
        err.as_watch_error(),
        Some(&WatchError::InvalidResourceVersion("not-a-number".into()))
    );
    assert_eq!(client.watcher_count(ResourceKind::PODS), 0);
}

#[test]
fn test_error_classification() {
    let expired = Error::from(WatchError::WatcherExpired { watcher_id: 7 });
    let closed = Error::from(WatchError::BroadcasterClosed);

    assert!(expired.is_retryable());
    assert!(!expired.is_terminal());
    assert!(closed.is_terminal());
    assert!(!closed.is_retryable());
    assert_eq!(
        closed.to_string(),
        "Broadcaster is closed"
    );
}

#[tokio::test]
async fn test_close_releases_emit_blocked_on_full_queue() {
    let mut config = EmulatorConfig::default();
    config.watch.watcher_buffer_size = 1;
    config.watch.supervisor_interval_in_ms = 10;
    let client = Arc::new(RestClient::new(config).unwrap());
    let mut watcher = client.watch(ResourceKind::PODS, WatchOptions::new()).unwrap();

    client
        .emit_pod_watch_event(EventType::Added, test_pod())
        .await
        .unwrap();

    let producer = client.clone();
    let blocked_emit = tokio::spawn(async move {
        producer
            .emit_pod_watch_event(EventType::Modified, test_pod())
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked_emit.is_finished());

    client.close().await;

    let err = tokio::time::timeout(RECV_TIMEOUT, blocked_emit)
        .await
        .expect("emit stayed blocked after close")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.as_watch_error(), Some(&WatchError::BroadcasterClosed));

    let event = next_event(&mut watcher).await.unwrap();
    assert_eq!(event.event_type(), EventType::Added);
    assert_eq!(event.resource_version(), 1);
    assert!(next_event(&mut watcher).await.is_none());
    assert_eq!(watcher.close_reason(), Some(CloseReason::Shutdown));
}
