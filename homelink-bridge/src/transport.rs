use crate::config::BridgeConfig;
use crate::error::BridgeError;
use futures::future::BoxFuture;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS, Transport};
use std::time::Duration;
use tracing::{error, info, warn};

pub(crate) const KEEP_ALIVE: Duration = Duration::from_secs(30);
pub(crate) const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Publish seam between the dispatcher and the broker. The real
/// implementation wraps `rumqttc::AsyncClient`; the devkit stub records
/// messages instead. Must be safe for concurrent callers.
pub trait MessagePublisher: Send + Sync {
    fn publish(&self, topic: String, payload: Vec<u8>) -> BoxFuture<'_, Result<(), BridgeError>>;
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MessagePublisher for MqttPublisher {
    fn publish(&self, topic: String, payload: Vec<u8>) -> BoxFuture<'_, Result<(), BridgeError>> {
        Box::pin(async move {
            let publish = self.client.publish(topic, QoS::AtLeastOnce, false, payload);
            match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(BridgeError::Transport(e.to_string())),
                Err(_) => Err(BridgeError::Transport(format!(
                    "publish timed out after {}s",
                    PUBLISH_TIMEOUT.as_secs()
                ))),
            }
        })
    }
}

/// Establishes the broker connection and subscribes to the device's status
/// and ack topics. Every failure is logged and collapses to `None`; nothing
/// escapes this boundary.
pub(crate) async fn connect_transport(config: &BridgeConfig) -> Option<(MqttPublisher, EventLoop)> {
    let mqtt = &config.mqtt;
    if !mqtt.enabled {
        info!("MQTT disabled via config, device bridge stays offline");
        return None;
    }
    if mqtt.host.is_empty() {
        warn!("MQTT broker host not configured, device bridge stays offline");
        return None;
    }

    let client_id = format!("homelink-bridge-{}", config.device.device_id);
    let mut options = MqttOptions::new(client_id, mqtt.host.clone(), mqtt.port);
    options.set_keep_alive(KEEP_ALIVE);
    if !mqtt.username.is_empty() {
        options.set_credentials(mqtt.username.clone(), mqtt.password.clone());
    }
    if mqtt.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    // Drive the event loop until the broker acknowledges the session, so
    // connect() can report honestly instead of assuming.
    let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Incoming::ConnAck(_)))) => break,
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => {
                error!("failed to connect to MQTT broker {}:{}: {e}", mqtt.host, mqtt.port);
                return None;
            }
            Err(_) => {
                error!("timed out connecting to MQTT broker {}:{}", mqtt.host, mqtt.port);
                return None;
            }
        }
    }
    info!("connected to MQTT broker {}:{}", mqtt.host, mqtt.port);

    let status_topic = config.device.status_topic();
    let ack_topic = config.device.ack_topic();
    for topic in [&status_topic, &ack_topic] {
        if let Err(e) = client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
            error!("failed to subscribe to {topic}: {e}");
            return None;
        }
    }
    info!("subscribed to {status_topic} and {ack_topic}");

    Some((MqttPublisher { client }, eventloop))
}
