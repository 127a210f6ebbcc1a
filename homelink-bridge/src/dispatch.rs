use crate::config::DeviceConf;
use crate::error::BridgeError;
use crate::models::{relay_name, sanitize_for_display, DeviceCommand, RelayAction, RELAY_COUNT};
use crate::service::ConnectionState;
use crate::state::Shared;
use crate::status::{DeviceStatus, DeviceStatusSnapshot};
use crate::transport::MessagePublisher;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// At most one STATUS_REQ per window; the cache answers in between.
pub const STATUS_REQUEST_COOLDOWN: Duration = Duration::from_secs(30);

/// What a successful dispatch hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReceipt {
    pub command_id: String,
    pub relay_name: String,
    pub action: RelayAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<i64>,
    pub message: String,
}

/// Builds and publishes outbound commands. Safe to call from many contexts
/// concurrently: it only reads the cache and hands payloads to the
/// publisher, which serializes its own sends.
pub struct CommandDispatcher {
    publisher: Arc<dyn MessagePublisher>,
    state: watch::Receiver<ConnectionState>,
    cache: Shared<DeviceStatus>,
    commands_topic: String,
    last_status_request: Mutex<Option<Instant>>,
}

impl CommandDispatcher {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        state: watch::Receiver<ConnectionState>,
        cache: Shared<DeviceStatus>,
        device: &DeviceConf,
    ) -> Self {
        Self {
            publisher,
            state,
            cache,
            commands_topic: device.commands_topic(),
            last_status_request: Mutex::new(None),
        }
    }

    fn ensure_connected(&self) -> Result<(), BridgeError> {
        if *self.state.borrow() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(BridgeError::Connection("MQTT transport not connected".into()))
        }
    }

    fn validate_relay(relay_number: u8) -> Result<(), BridgeError> {
        if (1..=RELAY_COUNT as u8).contains(&relay_number) {
            Ok(())
        } else {
            Err(BridgeError::Validation(format!(
                "relay number must be 1-{RELAY_COUNT}, got {relay_number}"
            )))
        }
    }

    async fn publish_command(&self, command: &DeviceCommand) -> Result<(), BridgeError> {
        let payload = serde_json::to_vec(command)?;
        self.publisher.publish(self.commands_topic.clone(), payload).await
    }

    /// Switch a relay right now.
    pub async fn publish_immediate(
        &self,
        relay_number: u8,
        action: RelayAction,
    ) -> Result<CommandReceipt, BridgeError> {
        Self::validate_relay(relay_number)?;
        self.ensure_connected()?;

        let command_id = Uuid::new_v4().to_string();
        let command = DeviceCommand::Immediate {
            command_id: command_id.clone(),
            relay_number,
            action,
        };
        self.publish_command(&command).await?;

        let relay_name = relay_name(relay_number);
        info!("published IMMEDIATE {command_id}: {relay_name} -> {action}");
        Ok(CommandReceipt {
            command_id,
            message: format!("Sent {action} command to {relay_name}"),
            relay_name,
            action,
            scheduled_time: None,
        })
    }

    /// Hand the device a schedule to execute on its own clock. The display
    /// name is sanitized before it goes anywhere near the device's LCD.
    pub async fn publish_schedule(
        &self,
        relay_number: u8,
        action: RelayAction,
        scheduled_time: i64,
        device_name: Option<&str>,
    ) -> Result<CommandReceipt, BridgeError> {
        Self::validate_relay(relay_number)?;
        self.ensure_connected()?;

        let command_id = Uuid::new_v4().to_string();
        let relay_name = device_name
            .map(str::to_owned)
            .unwrap_or_else(|| relay_name(relay_number));
        let command = DeviceCommand::Schedule {
            command_id: command_id.clone(),
            relay_number,
            action,
            scheduled_time,
            device_name: sanitize_for_display(&relay_name),
        };
        self.publish_command(&command).await?;

        info!("published SCHEDULE {command_id}: {relay_name} -> {action} at {scheduled_time}");
        Ok(CommandReceipt {
            command_id,
            message: format!("Scheduled {relay_name} to {action} at timestamp {scheduled_time}"),
            relay_name,
            action,
            scheduled_time: Some(scheduled_time),
        })
    }

    /// Fire-and-forget cancellation; the device's cancel is idempotent and
    /// we do not track whether it took effect.
    pub async fn cancel_schedule(&self, command_id: &str) -> Result<(), BridgeError> {
        self.ensure_connected()?;
        let command = DeviceCommand::Cancel {
            command_id: command_id.to_string(),
        };
        self.publish_command(&command).await?;
        info!("published CANCEL for {command_id}");
        Ok(())
    }

    /// Nudges the device for fresh state at most once per cooldown window
    /// (always when forced), then returns the cached snapshot immediately.
    /// Never waits for the device's reply.
    pub async fn request_status(&self, force: bool) -> DeviceStatusSnapshot {
        let connected = *self.state.borrow() == ConnectionState::Connected;
        let due = {
            let mut last = self.last_status_request.lock();
            let due = force || last.map_or(true, |at| at.elapsed() >= STATUS_REQUEST_COOLDOWN);
            if due && connected {
                // Claim the window before publishing so concurrent callers
                // cannot double-send.
                *last = Some(Instant::now());
            }
            due
        };

        if connected && due {
            let command = DeviceCommand::StatusReq {
                command_id: Uuid::new_v4().to_string(),
            };
            match self.publish_command(&command).await {
                Ok(()) => debug!("requested device status"),
                Err(e) => error!("failed to request device status: {e}"),
            }
        } else if !due {
            debug!(
                "status request rate-limited ({}s cooldown)",
                STATUS_REQUEST_COOLDOWN.as_secs()
            );
        }

        self.cache.lock().snapshot()
    }

    /// Tells the device the schedule replay is over. Used by the sync
    /// coordinator after republishing pending schedules.
    pub(crate) async fn publish_sync_complete(&self, count: usize) -> Result<(), BridgeError> {
        self.ensure_connected()?;
        self.publish_command(&DeviceCommand::SyncComplete { count }).await
    }
}

// Dispatcher tests live in tests/dispatch.rs: they use devkit's StubPublisher,
// which can only implement this crate's traits against the non-test build.
