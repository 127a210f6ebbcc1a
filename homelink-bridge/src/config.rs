use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub mqtt: MqttConf,
    pub device: DeviceConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Feature switch: when false the bridge never connects and every
    /// dispatch degrades to an error result.
    pub enabled: bool,
    pub tls: bool,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8883,
            username: String::new(),
            password: String::new(),
            enabled: false,
            tls: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConf {
    pub device_id: String,
    pub topic_base: String,
}

impl Default for DeviceConf {
    fn default() -> Self {
        Self {
            device_id: "esp32-home".into(),
            topic_base: "homelink/devices".into(),
        }
    }
}

impl DeviceConf {
    /// Backend -> device commands.
    pub fn commands_topic(&self) -> String {
        format!("{}/{}/commands", self.topic_base, self.device_id)
    }

    /// Device -> backend status reports, heartbeats, sync requests.
    pub fn status_topic(&self) -> String {
        format!("{}/{}/status", self.topic_base, self.device_id)
    }

    /// Device -> backend command acknowledgments and execution reports.
    pub fn ack_topic(&self) -> String {
        format!("{}/{}/ack", self.topic_base, self.device_id)
    }
}

/// Loads the bridge config from the YAML file named by `HOMELINK_CONFIG`
/// (default `homelink.yaml`). A missing or invalid file falls back to
/// defaults so the host keeps starting, just without device control.
pub async fn load_config() -> BridgeConfig {
    let path = std::env::var("HOMELINK_CONFIG").unwrap_or_else(|_| "homelink.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return BridgeConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!("invalid config in {path}: {e}, using defaults");
            BridgeConfig::default()
        })
    } else {
        info!("no {path}, using default config");
        BridgeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_disabled() {
        let config = BridgeConfig::default();
        assert!(!config.mqtt.enabled);
        assert!(config.mqtt.host.is_empty());
        assert_eq!(config.mqtt.port, 8883);
    }

    #[test]
    fn topics_follow_device_id() {
        let device = DeviceConf {
            device_id: "esp32-garage".into(),
            ..DeviceConf::default()
        };
        assert_eq!(device.commands_topic(), "homelink/devices/esp32-garage/commands");
        assert_eq!(device.status_topic(), "homelink/devices/esp32-garage/status");
        assert_eq!(device.ack_topic(), "homelink/devices/esp32-garage/ack");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: BridgeConfig =
            serde_yaml::from_str("mqtt:\n  host: broker.example.com\n  enabled: true\n").unwrap();
        assert_eq!(config.mqtt.host, "broker.example.com");
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.device.device_id, "esp32-home");
    }
}
