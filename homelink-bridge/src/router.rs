use crate::dispatch::CommandDispatcher;
use crate::models::{DeviceEvent, RelayState};
use crate::service::ConnectionState;
use crate::state::Shared;
use crate::status::DeviceStatus;
use crate::sync::{PendingScheduleProvider, ScheduleSync, TaskCompletionNotifier};
use rumqttc::{Event, EventLoop, Incoming};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Dispatches inbound device messages. Exactly one listener task drives it
/// for the lifetime of a connection, which makes it the sole mutator of the
/// status cache.
pub struct MessageRouter {
    cache: Shared<DeviceStatus>,
    sync: ScheduleSync,
    notifier: Shared<Option<Arc<dyn TaskCompletionNotifier>>>,
}

impl MessageRouter {
    pub fn new(
        cache: Shared<DeviceStatus>,
        provider: Shared<Option<Arc<dyn PendingScheduleProvider>>>,
        notifier: Shared<Option<Arc<dyn TaskCompletionNotifier>>>,
    ) -> Self {
        Self {
            cache,
            sync: ScheduleSync::new(provider),
            notifier,
        }
    }

    /// Handles one raw payload from the broker. Malformed payloads are
    /// logged and dropped; unknown message types are ignored. Neither ends
    /// the listener.
    pub async fn handle_payload(&self, topic: &str, payload: &[u8], dispatcher: &CommandDispatcher) {
        let event = match DeviceEvent::parse(payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("ignoring unknown message type on {topic}");
                return;
            }
            Err(e) => {
                warn!("dropping malformed payload on {topic}: {e}");
                return;
            }
        };

        let device_id = device_id_from_topic(topic);
        match event {
            DeviceEvent::Status { relays, wifi_rssi } => {
                let mut cache = self.cache.lock();
                for report in relays {
                    if !cache.set_relay_state(report.number, report.state) {
                        warn!("STATUS from {device_id} reports out-of-range relay {}", report.number);
                    }
                }
                cache.mark_status_update(wifi_rssi);
                info!("device {device_id} status updated");
            }
            DeviceEvent::Heartbeat { wifi_rssi } => {
                self.cache.lock().record_heartbeat(wifi_rssi);
                debug!("heartbeat from {device_id}, rssi {wifi_rssi:?}");
            }
            DeviceEvent::Ack { command_id, success, message } => {
                // Command-level acks are informational only; nothing persists them.
                info!("ack from {device_id} for {command_id}: success={success:?} {message}");
            }
            DeviceEvent::Executed { command_id, relay_number, state } => {
                self.handle_executed(device_id, command_id, relay_number, state).await;
            }
            DeviceEvent::SyncReq => {
                self.sync.handle_sync_request(device_id, dispatcher).await;
            }
        }
    }

    async fn handle_executed(
        &self,
        device_id: &str,
        command_id: Option<String>,
        relay_number: u8,
        state: Option<RelayState>,
    ) {
        let state = state.unwrap_or_default();
        info!("device {device_id} executed schedule {command_id:?}: relay {relay_number} -> {state}");

        if !self.cache.lock().set_relay_state(relay_number, state) {
            warn!("EXECUTED from {device_id} reports out-of-range relay {relay_number}");
        }

        // Completion delivery is best-effort; the notifier is idempotent by
        // contract, so a duplicate EXECUTED just notifies again.
        let notifier = self.notifier.lock().clone();
        if let (Some(command_id), Some(notifier)) = (command_id, notifier) {
            match notifier.task_completed(&command_id).await {
                Ok(()) => info!("task marked complete for command {command_id}"),
                Err(e) => error!("task completion notifier failed for {command_id}: {e}"),
            }
        }
    }
}

/// Topics look like `{base}/{device_id}/status`; the device id is the
/// second-to-last segment.
pub(crate) fn device_id_from_topic(topic: &str) -> &str {
    let mut segments = topic.rsplit('/');
    segments.next();
    segments.next().unwrap_or("unknown")
}

/// The single background listener: consumes the inbound stream until
/// cancelled or the transport fails. There is no reconnect loop in here; on
/// failure it flips the shared state to Disconnected and exits, leaving the
/// restart decision to an external supervisor watching that state.
pub(crate) fn spawn_listener(
    mut eventloop: EventLoop,
    router: MessageRouter,
    dispatcher: Arc<CommandDispatcher>,
    state_tx: watch::Sender<ConnectionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    router
                        .handle_payload(&publish.topic, &publish.payload, &dispatcher)
                        .await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT listener failed: {e}, bridge is now disconnected");
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    break;
                }
            }
        }
    })
}
