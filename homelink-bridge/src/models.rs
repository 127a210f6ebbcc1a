use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Switchable output channels on the controller board.
pub const RELAY_COUNT: usize = 4;

/// Character budget of the controller's 16x2 display.
pub const DISPLAY_WIDTH: usize = 16;

/// What a relay can be told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    On,
    Off,
    Toggle,
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayAction::On => write!(f, "on"),
            RelayAction::Off => write!(f, "off"),
            RelayAction::Toggle => write!(f, "toggle"),
        }
    }
}

impl FromStr for RelayAction {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(RelayAction::On),
            "off" => Ok(RelayAction::Off),
            "toggle" => Ok(RelayAction::Toggle),
            other => Err(BridgeError::Validation(format!(
                "action must be on, off or toggle, got {other:?}"
            ))),
        }
    }
}

/// What a relay reports itself to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    On,
    #[default]
    Off,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => write!(f, "on"),
            RelayState::Off => write!(f, "off"),
        }
    }
}

/// Human-readable name for a relay channel.
pub fn relay_name(relay_number: u8) -> String {
    match relay_number {
        1 => "Light".into(),
        2 => "Fan".into(),
        3 => "Aquarium".into(),
        n => format!("Relay {n}"),
    }
}

/// Outbound commands on `{base}/{device_id}/commands`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DeviceCommand {
    #[serde(rename = "IMMEDIATE")]
    Immediate {
        command_id: String,
        relay_number: u8,
        action: RelayAction,
    },
    #[serde(rename = "SCHEDULE")]
    Schedule {
        command_id: String,
        relay_number: u8,
        action: RelayAction,
        scheduled_time: i64,
        device_name: String,
    },
    #[serde(rename = "CANCEL")]
    Cancel { command_id: String },
    #[serde(rename = "STATUS_REQ")]
    StatusReq { command_id: String },
    #[serde(rename = "SYNC_COMPLETE")]
    SyncComplete { count: usize },
}

/// Inbound messages on the device's status and ack topics.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceEvent {
    #[serde(rename = "STATUS")]
    Status {
        #[serde(default)]
        relays: Vec<RelayReport>,
        wifi_rssi: Option<i32>,
    },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { wifi_rssi: Option<i32> },
    #[serde(rename = "ACK")]
    Ack {
        command_id: String,
        success: Option<bool>,
        #[serde(default)]
        message: String,
    },
    #[serde(rename = "EXECUTED")]
    Executed {
        command_id: Option<String>,
        relay_number: u8,
        state: Option<RelayState>,
    },
    #[serde(rename = "SYNC_REQ")]
    SyncReq,
}

/// Per-relay entry inside a STATUS report.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayReport {
    pub number: u8,
    #[serde(default)]
    pub state: RelayState,
}

impl DeviceEvent {
    /// Parses an inbound payload. Malformed JSON (or a known type with a
    /// broken shape) is an error the caller logs and drops; valid JSON with
    /// an unknown `type` discriminator is silently ignored (`Ok(None)`).
    pub fn parse(payload: &[u8]) -> Result<Option<Self>, BridgeError> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("STATUS" | "HEARTBEAT" | "ACK" | "EXECUTED" | "SYNC_REQ") => {
                Ok(Some(serde_json::from_value(value).map_err(BridgeError::from)?))
            }
            _ => Ok(None),
        }
    }
}

/// A schedule the backend believes the device has not received yet.
/// Owned by the task storage collaborator; the bridge only ships it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSchedule {
    pub command_id: String,
    pub relay_number: u8,
    pub action: RelayAction,
    pub scheduled_time: i64,
    pub device_name: String,
    pub task_id: String,
}

/// Sanitizes text for the controller's character display: printable ASCII
/// only, whitespace collapsed, truncated to [`DISPLAY_WIDTH`]. Idempotent.
pub fn sanitize_for_display(text: &str) -> String {
    let ascii: String = text.chars().filter(|c| (' '..='~').contains(c)).collect();
    let collapsed = ascii.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(DISPLAY_WIDTH)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parses_the_three_values_only() {
        assert_eq!("on".parse::<RelayAction>().unwrap(), RelayAction::On);
        assert_eq!("off".parse::<RelayAction>().unwrap(), RelayAction::Off);
        assert_eq!("toggle".parse::<RelayAction>().unwrap(), RelayAction::Toggle);
        assert!("blink".parse::<RelayAction>().is_err());
        assert!("ON".parse::<RelayAction>().is_err());
        assert!("".parse::<RelayAction>().is_err());
    }

    #[test]
    fn commands_carry_wire_tags() {
        let command = DeviceCommand::Immediate {
            command_id: "abc".into(),
            relay_number: 2,
            action: RelayAction::On,
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["type"], "IMMEDIATE");
        assert_eq!(value["relay_number"], 2);
        assert_eq!(value["action"], "on");

        let complete = serde_json::to_value(DeviceCommand::SyncComplete { count: 3 }).unwrap();
        assert_eq!(complete["type"], "SYNC_COMPLETE");
        assert_eq!(complete["count"], 3);
    }

    #[test]
    fn events_parse_by_type() {
        let event = DeviceEvent::parse(br#"{"type":"HEARTBEAT","wifi_rssi":-61}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(event, DeviceEvent::Heartbeat { wifi_rssi: Some(-61) }));

        let event = DeviceEvent::parse(
            br#"{"type":"EXECUTED","command_id":"c1","relay_number":3,"state":"on"}"#,
        )
        .unwrap()
        .unwrap();
        match event {
            DeviceEvent::Executed { command_id, relay_number, state } => {
                assert_eq!(command_id.as_deref(), Some("c1"));
                assert_eq!(relay_number, 3);
                assert_eq!(state, Some(RelayState::On));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_ignored_not_an_error() {
        assert!(DeviceEvent::parse(br#"{"type":"REBOOTED"}"#).unwrap().is_none());
        assert!(DeviceEvent::parse(br#"{"relay_number":1}"#).unwrap().is_none());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(DeviceEvent::parse(b"{not json").is_err());
        // Known type with a broken shape is malformed, not ignorable.
        assert!(DeviceEvent::parse(br#"{"type":"EXECUTED"}"#).is_err());
    }

    #[test]
    fn sanitizer_strips_non_ascii_collapses_and_truncates() {
        assert_eq!(sanitize_for_display("Fan \u{1F32C}  speed"), "Fan speed");
        assert_eq!(sanitize_for_display("  Aquarium   pump  "), "Aquarium pump");
        let long = sanitize_for_display("a very long device name indeed");
        assert!(long.len() <= DISPLAY_WIDTH);
        assert!(long.is_ascii());
    }

    #[test]
    fn sanitizer_is_idempotent() {
        for input in [
            "Fan \u{1F32C}  speed",
            "aaaaaaaaaaaaaaa x",
            "  spaced   out   name  ",
            "plain",
            "",
        ] {
            let once = sanitize_for_display(input);
            assert_eq!(sanitize_for_display(&once), once, "input {input:?}");
            assert!(once.len() <= DISPLAY_WIDTH);
            assert!(once.is_ascii());
        }
    }

    #[test]
    fn relay_names_cover_all_channels() {
        assert_eq!(relay_name(1), "Light");
        assert_eq!(relay_name(2), "Fan");
        assert_eq!(relay_name(3), "Aquarium");
        assert_eq!(relay_name(4), "Relay 4");
    }
}
