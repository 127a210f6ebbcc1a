use crate::config::BridgeConfig;
use crate::dispatch::CommandDispatcher;
use crate::router::{spawn_listener, MessageRouter};
use crate::state::{new_shared, Shared};
use crate::status::{DeviceStatus, DeviceStatusSnapshot};
use crate::sync::{PendingScheduleProvider, TaskCompletionNotifier};
use crate::transport::connect_transport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Lifecycle of the bridge's single broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Owned facade over the whole device channel: one constructed instance per
/// process, passed around explicitly. Holds the connection lifecycle, the
/// status cache, and the registered collaborators.
pub struct DeviceBridge {
    config: BridgeConfig,
    cache: Shared<DeviceStatus>,
    provider: Shared<Option<Arc<dyn PendingScheduleProvider>>>,
    notifier: Shared<Option<Arc<dyn TaskCompletionNotifier>>>,
    state_tx: watch::Sender<ConnectionState>,
    listener: Option<JoinHandle<()>>,
    dispatcher: Option<Arc<CommandDispatcher>>,
}

impl DeviceBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            cache: new_shared(DeviceStatus::default()),
            provider: new_shared(None),
            notifier: new_shared(None),
            state_tx,
            listener: None,
            dispatcher: None,
        }
    }

    /// Connects to the broker, subscribes to the device topics and starts
    /// the listener. Returns false (logged, never panicking) when the
    /// feature is disabled, misconfigured, or the broker is unreachable.
    pub async fn connect(&mut self) -> bool {
        if self.is_connected() {
            debug!("bridge already connected");
            return true;
        }
        self.state_tx.send_replace(ConnectionState::Connecting);

        let Some((publisher, eventloop)) = connect_transport(&self.config).await else {
            self.state_tx.send_replace(ConnectionState::Disconnected);
            return false;
        };

        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::new(publisher),
            self.state_tx.subscribe(),
            self.cache.clone(),
            &self.config.device,
        ));
        let router = MessageRouter::new(
            self.cache.clone(),
            self.provider.clone(),
            self.notifier.clone(),
        );

        self.state_tx.send_replace(ConnectionState::Connected);
        self.listener = Some(spawn_listener(
            eventloop,
            router,
            dispatcher.clone(),
            self.state_tx.clone(),
        ));
        self.dispatcher = Some(dispatcher);
        true
    }

    /// Cancels the listener and tears the connection down. Idempotent; safe
    /// when already disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            // Swallow the cancellation so shutdown is always clean.
            let _ = listener.await;
        }
        self.dispatcher = None;
        let previous = self.state_tx.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!("disconnected from MQTT broker");
        }
    }

    pub fn set_schedule_provider(&self, provider: Arc<dyn PendingScheduleProvider>) {
        *self.provider.lock() = Some(provider);
    }

    pub fn set_completion_notifier(&self, notifier: Arc<dyn TaskCompletionNotifier>) {
        *self.notifier.lock() = Some(notifier);
    }

    /// Command dispatch surface; None while disconnected.
    pub fn dispatcher(&self) -> Option<Arc<CommandDispatcher>> {
        self.dispatcher.clone()
    }

    /// Read-only view of the cached device state.
    pub fn device_status(&self) -> DeviceStatusSnapshot {
        self.cache.lock().snapshot()
    }

    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// For external supervisors: observe Disconnected (including listener
    /// failure) and decide when to call connect() again. The bridge itself
    /// never auto-reconnects.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}
