use anyhow::Result;
use homelink_bridge::config::load_config;
use homelink_bridge::service::DeviceBridge;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present, then logging.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let config = load_config().await;
    let mut bridge = DeviceBridge::new(config);

    if !bridge.connect().await {
        warn!("bridge started without an MQTT connection, device control is unavailable");
    }

    info!("homelink bridge running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    bridge.disconnect().await;
    Ok(())
}
