//! Homelink device bridge - MQTT command and schedule sync for relay controllers
//!
//! This crate is the backend side of the device channel: it dispatches relay
//! commands to a remote controller over MQTT, tracks the controller's reported
//! state and liveness from its status/ack topics, and replays missed schedules
//! when the controller reconnects and asks what it missed.
//!
//! The surrounding application (HTTP API, task storage) stays outside: it
//! consumes the [`service::DeviceBridge`] facade and plugs in collaborators
//! through the [`sync::PendingScheduleProvider`] and
//! [`sync::TaskCompletionNotifier`] traits.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod router;
pub mod service;
pub mod state;
pub mod status;
pub mod sync;
pub mod transport;

pub use config::{load_config, BridgeConfig};
pub use dispatch::{CommandDispatcher, CommandReceipt};
pub use error::BridgeError;
pub use models::{PendingSchedule, RelayAction, RelayState};
pub use service::{ConnectionState, DeviceBridge};
pub use status::DeviceStatusSnapshot;
pub use sync::{PendingScheduleProvider, TaskCompletionNotifier};
pub use transport::MessagePublisher;
