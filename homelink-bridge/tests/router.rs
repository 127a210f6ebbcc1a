//! Inbound message routing behavior, broker stubbed out.

use homelink_bridge::config::DeviceConf;
use homelink_bridge::dispatch::CommandDispatcher;
use homelink_bridge::models::RelayState;
use homelink_bridge::router::MessageRouter;
use homelink_bridge::service::ConnectionState;
use homelink_bridge::state::{new_shared, Shared};
use homelink_bridge::status::DeviceStatus;
use homelink_bridge::sync::{PendingScheduleProvider, TaskCompletionNotifier};
use homelink_devkit::events;
use homelink_devkit::providers::CountingNotifier;
use homelink_devkit::stub::StubPublisher;
use std::sync::Arc;
use tokio::sync::watch;

const STATUS_TOPIC: &str = "homelink/devices/esp32-home/status";

struct Fixture {
    publisher: Arc<StubPublisher>,
    router: MessageRouter,
    dispatcher: CommandDispatcher,
    cache: Shared<DeviceStatus>,
    notifier: Arc<CountingNotifier>,
    _state_tx: watch::Sender<ConnectionState>,
}

fn fixture() -> Fixture {
    let publisher = Arc::new(StubPublisher::new());
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
    let cache = new_shared(DeviceStatus::default());
    let notifier = Arc::new(CountingNotifier::new());
    let notifier_cell: Shared<Option<Arc<dyn TaskCompletionNotifier>>> =
        new_shared(Some(notifier.clone() as Arc<dyn TaskCompletionNotifier>));
    let provider_cell: Shared<Option<Arc<dyn PendingScheduleProvider>>> = new_shared(None);

    let dispatcher = CommandDispatcher::new(
        publisher.clone(),
        state_rx,
        cache.clone(),
        &DeviceConf::default(),
    );
    let router = MessageRouter::new(cache.clone(), provider_cell, notifier_cell);
    Fixture {
        publisher,
        router,
        dispatcher,
        cache,
        notifier,
        _state_tx: state_tx,
    }
}

#[tokio::test]
async fn status_report_overwrites_relay_states() {
    let f = fixture();
    let payload = events::status(&[(1, "on"), (3, "on")], -58);
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;

    let cache = f.cache.lock();
    assert_eq!(cache.relay_state(1), Some(RelayState::On));
    assert_eq!(cache.relay_state(2), Some(RelayState::Off));
    assert_eq!(cache.relay_state(3), Some(RelayState::On));
    assert!(cache.is_online());
    assert_eq!(cache.snapshot().wifi_rssi, Some(-58));
}

#[tokio::test]
async fn status_with_out_of_range_relay_keeps_the_rest() {
    let f = fixture();
    let payload = events::status(&[(9, "on"), (2, "on")], -58);
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;

    assert_eq!(f.cache.lock().relay_state(2), Some(RelayState::On));
}

#[tokio::test]
async fn heartbeat_refreshes_liveness() {
    let f = fixture();
    f.router
        .handle_payload(STATUS_TOPIC, &events::heartbeat(-61), &f.dispatcher)
        .await;

    let snapshot = f.cache.lock().snapshot();
    assert!(snapshot.online);
    assert_eq!(snapshot.wifi_rssi, Some(-61));
    assert!(snapshot.last_heartbeat.is_some());
}

#[tokio::test]
async fn executed_updates_relay_and_notifies_once_per_message() {
    let f = fixture();
    let payload = events::executed("cmd-42", 2, "on");
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;

    assert_eq!(f.cache.lock().relay_state(2), Some(RelayState::On));
    assert_eq!(f.notifier.completed(), vec!["cmd-42".to_string()]);

    // A duplicate EXECUTED notifies again; dedup is the notifier's job.
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;
    assert_eq!(f.notifier.completed().len(), 2);
}

#[tokio::test]
async fn notifier_failure_is_swallowed() {
    let f = fixture();
    f.notifier.fail_always();
    let payload = events::executed("cmd-7", 1, "off");
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;

    // The relay update still landed even though the notifier failed.
    assert_eq!(f.cache.lock().relay_state(1), Some(RelayState::Off));
    assert!(f.notifier.completed().is_empty());
}

#[tokio::test]
async fn executed_out_of_range_relay_is_ignored_but_still_notifies() {
    let f = fixture();
    let payload = events::executed("cmd-8", 9, "on");
    f.router.handle_payload(STATUS_TOPIC, &payload, &f.dispatcher).await;

    let cache = f.cache.lock();
    for relay in 1..=4u8 {
        assert_eq!(cache.relay_state(relay), Some(RelayState::Off));
    }
    drop(cache);
    assert_eq!(f.notifier.completed(), vec!["cmd-8".to_string()]);
}

#[tokio::test]
async fn malformed_then_valid_payloads_both_get_handled() {
    let f = fixture();
    f.router
        .handle_payload(STATUS_TOPIC, &events::malformed(), &f.dispatcher)
        .await;
    f.router
        .handle_payload(STATUS_TOPIC, &events::unknown("REBOOTED"), &f.dispatcher)
        .await;
    f.router
        .handle_payload(STATUS_TOPIC, &events::heartbeat(-60), &f.dispatcher)
        .await;

    assert!(f.cache.lock().is_online(), "valid message after garbage still lands");
    assert_eq!(f.publisher.published_count(), 0);
}

#[tokio::test]
async fn sync_req_without_provider_publishes_nothing() {
    let f = fixture();
    f.router
        .handle_payload(STATUS_TOPIC, &events::sync_req(), &f.dispatcher)
        .await;
    assert_eq!(f.publisher.published_count(), 0);
}
