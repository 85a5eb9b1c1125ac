//! Error handling and edge case tests.

use changefeed_failover::{
    ChangeEvent, ChangeHandler, ChangeSubscriber, Endpoint, FailoverConfig, FailoverCoordinator,
    FailoverError, FailoverEvent, FeedError, ForwardingSubscriber, MemoryConnector,
    ServerConnection, SubscriptionHandle,
};
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn endpoint(address: &str) -> Endpoint {
    Endpoint::new(address, "orders")
}

fn noop_subscriber() -> Arc<dyn ChangeSubscriber> {
    Arc::new(|_conn: &ServerConnection| -> changefeed_failover::Result<SubscriptionHandle> {
        Ok(SubscriptionHandle::new(|| {}))
    })
}

// --- Startup Errors ---

#[test]
fn test_empty_preference_list() {
    let connector = MemoryConnector::new();
    let result = FailoverCoordinator::initialize(
        FailoverConfig::default(),
        &connector,
        noop_subscriber(),
    );
    assert!(matches!(result, Err(FailoverError::EmptyPreferenceList)));
}

#[test]
fn test_duplicate_server() {
    let connector = MemoryConnector::new();
    let config = FailoverConfig::with_servers(vec![endpoint("a"), endpoint("b"), endpoint("a")]);

    let result = FailoverCoordinator::initialize(config, &connector, noop_subscriber());
    assert!(matches!(result, Err(FailoverError::DuplicateServer(_))));
}

#[test]
fn test_connect_failure_closes_opened_connections() {
    let connector = MemoryConnector::new();
    let first = connector.add(endpoint("a"), true);
    connector.refuse(endpoint("b"));

    let config = FailoverConfig::with_servers(vec![endpoint("a"), endpoint("b")]);
    let result = FailoverCoordinator::initialize(config, &connector, noop_subscriber());

    match result {
        Err(FailoverError::Connect { server, .. }) => assert_eq!(server, endpoint("b")),
        other => panic!("Expected Connect error, got {:?}", other.map(|_| ())),
    }
    assert!(first.is_closed());
}

#[test]
fn test_malformed_config() {
    let result = FailoverConfig::from_json_str("{\"servers\": [{\"address\": \"a\"");
    assert!(matches!(result, Err(FailoverError::Config(_))));

    let result = FailoverConfig::from_json_str(r#"{"servers": [], "handover": "make_before_break"}"#);
    assert!(matches!(result, Err(FailoverError::EmptyPreferenceList)));

    let result = FailoverConfig::from_json_str(
        r#"{"servers": [{"address": "a", "dataset": "orders"}], "handover": "sideways"}"#,
    );
    assert!(matches!(result, Err(FailoverError::Config(_))));
}

#[test]
fn test_disconnected_servers_are_not_startup_errors() {
    let connector = MemoryConnector::new();
    let config = FailoverConfig::with_servers(vec![endpoint("a"), endpoint("b")]);

    // Transports are created on demand, disconnected
    let coordinator = FailoverCoordinator::initialize(config, &connector, noop_subscriber()).unwrap();
    assert!(coordinator.is_running());
    assert!(coordinator.is_suspended());
}

// --- Subscribe Failures ---

#[test]
fn test_subscribe_failure_leaves_server_unsubscribed() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), true);
    let backup = connector.add(endpoint("backup"), true);
    primary.refuse_feeds(Some("unauthorized"));

    let subscriber = Arc::new(ForwardingSubscriber::new(|_: &Endpoint, _: ChangeEvent| {}));
    let config = FailoverConfig::with_servers(vec![endpoint("primary"), endpoint("backup")]);
    let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber).unwrap();

    // The chosen server failed; lower-priority servers are not substituted
    assert!(coordinator.active_server().is_none());
    assert_eq!(backup.feeds_opened(), 0);
    assert!(!coordinator.is_suspended());

    // Retried on the next pass
    primary.refuse_feeds(None);
    let report = coordinator.reevaluate().unwrap();
    assert_eq!(report.subscribed, vec![endpoint("primary")]);
    assert!(report.failures.is_empty());
}

#[test]
fn test_reevaluate_after_shutdown() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), true);

    let config = FailoverConfig::with_servers(vec![endpoint("primary")]);
    let coordinator = FailoverCoordinator::initialize(config, &connector, noop_subscriber()).unwrap();
    coordinator.shutdown();

    assert!(matches!(coordinator.reevaluate(), Err(FailoverError::ShutDown)));
    assert!(primary.is_closed());
}

#[test]
fn test_subscribe_failure_is_signalled() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), true);
    primary.refuse_feeds(Some("quota exceeded"));

    let config = FailoverConfig::with_servers(vec![endpoint("primary")]);
    let subscriber = Arc::new(ForwardingSubscriber::new(|_: &Endpoint, _: ChangeEvent| {}));
    let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber).unwrap();
    let listener = coordinator.listen();

    let report = coordinator.reevaluate().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].1.contains("quota exceeded"));

    match listener.recv_timeout(Duration::from_secs(1)).unwrap() {
        FailoverEvent::SubscribeFailed { server, reason } => {
            assert_eq!(server, endpoint("primary"));
            assert!(reason.contains("quota exceeded"));
        }
        other => panic!("Expected SubscribeFailed, got {:?}", other),
    }
}

// --- Stream Failures ---

struct ErrorSink(Sender<(Endpoint, FeedError)>);

impl ChangeHandler for ErrorSink {
    fn on_change(&self, _server: &Endpoint, _change: ChangeEvent) {}

    fn on_stream_error(&self, server: &Endpoint, error: &FeedError) {
        let _ = self.0.send((server.clone(), error.clone()));
    }
}

#[test]
fn test_stream_failure_does_not_trigger_failover() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), true);
    let backup = connector.add(endpoint("backup"), true);

    let (tx, rx) = unbounded();
    let subscriber = Arc::new(ForwardingSubscriber::new(ErrorSink(tx)));
    let config = FailoverConfig::with_servers(vec![endpoint("primary"), endpoint("backup")]);
    let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber).unwrap();
    let passes = coordinator.pass_count();

    primary.fail_feeds("replication reset");

    let (server, error) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(server, endpoint("primary"));
    assert_eq!(error, FeedError::Transport("replication reset".to_string()));

    // Connectivity never changed, so the coordinator still believes primary is live
    assert_eq!(coordinator.active_server(), Some(endpoint("primary")));
    assert_eq!(coordinator.pass_count(), passes);
    assert_eq!(backup.feeds_opened(), 0);
}

#[test]
fn test_stream_failure_recovers_on_connectivity_cycle() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), true);
    let backup = connector.add(endpoint("backup"), true);

    let subscriber = Arc::new(ForwardingSubscriber::new(|_: &Endpoint, _: ChangeEvent| {}));
    let config = FailoverConfig::with_servers(vec![endpoint("primary"), endpoint("backup")]);
    let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber).unwrap();

    primary.fail_feeds("replication reset");
    primary.set_connected(false);
    assert!(wait_until(|| coordinator.active_server() == Some(endpoint("backup"))));

    primary.set_connected(true);
    assert!(wait_until(|| coordinator.active_server() == Some(endpoint("primary"))
        && primary.open_feed_count() == 1));
    assert_eq!(primary.feeds_opened(), 2);
    assert!(wait_until(|| backup.open_feed_count() == 0));
}

// --- Panicking Collaborators ---

#[test]
fn test_panicking_release_is_isolated() {
    let connector = MemoryConnector::new();
    let primary = connector.add(endpoint("primary"), false);
    connector.add(endpoint("backup"), true);

    let subscriber: Arc<dyn ChangeSubscriber> = Arc::new(
        |conn: &ServerConnection| -> changefeed_failover::Result<SubscriptionHandle> {
            let address = conn.endpoint().address.clone();
            Ok(SubscriptionHandle::new(move || {
                if address == "backup" {
                    panic!("release failed");
                }
            }))
        },
    );
    let config = FailoverConfig::with_servers(vec![endpoint("primary"), endpoint("backup")]);
    let coordinator = FailoverCoordinator::initialize(config, &connector, subscriber).unwrap();
    assert_eq!(coordinator.active_server(), Some(endpoint("backup")));

    let listener = coordinator.listen();
    primary.set_connected(true);
    assert!(wait_until(|| coordinator.subscribed_servers() == vec![endpoint("primary")]));

    let mut failed = false;
    while let Ok(event) = listener.recv_timeout(Duration::from_millis(200)) {
        if let FailoverEvent::UnsubscribeFailed { server, reason } = event {
            assert_eq!(server, endpoint("backup"));
            assert!(reason.contains("release failed"));
            failed = true;
        }
    }
    assert!(failed);
}
