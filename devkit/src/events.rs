//! Raw inbound payloads as the controller firmware produces them.

use serde_json::json;

pub fn status(relays: &[(u8, &str)], wifi_rssi: i32) -> Vec<u8> {
    let relays: Vec<_> = relays
        .iter()
        .map(|(number, state)| json!({ "number": number, "state": state }))
        .collect();
    json!({ "type": "STATUS", "relays": relays, "wifi_rssi": wifi_rssi })
        .to_string()
        .into_bytes()
}

pub fn heartbeat(wifi_rssi: i32) -> Vec<u8> {
    json!({ "type": "HEARTBEAT", "wifi_rssi": wifi_rssi })
        .to_string()
        .into_bytes()
}

pub fn ack(command_id: &str, success: bool, message: &str) -> Vec<u8> {
    json!({ "type": "ACK", "command_id": command_id, "success": success, "message": message })
        .to_string()
        .into_bytes()
}

pub fn executed(command_id: &str, relay_number: u8, state: &str) -> Vec<u8> {
    json!({ "type": "EXECUTED", "command_id": command_id, "relay_number": relay_number, "state": state })
        .to_string()
        .into_bytes()
}

pub fn sync_req() -> Vec<u8> {
    json!({ "type": "SYNC_REQ" }).to_string().into_bytes()
}

/// Valid JSON with a message type the bridge does not know.
pub fn unknown(kind: &str) -> Vec<u8> {
    json!({ "type": kind }).to_string().into_bytes()
}

/// Not JSON at all.
pub fn malformed() -> Vec<u8> {
    b"{heartbeat: yes".to_vec()
}
