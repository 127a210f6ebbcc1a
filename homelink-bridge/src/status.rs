use crate::models::{relay_name, RelayState, RELAY_COUNT};
use serde::Serialize;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::Instant;

/// The controller heartbeats every 30s; allow one missed beat plus slack.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(45);

/// In-memory snapshot of the controller as last reported. Mutated only by
/// the message router's single listener task; everyone else reads.
#[derive(Debug, Default)]
pub struct DeviceStatus {
    relay_states: [RelayState; RELAY_COUNT],
    /// Wall-clock for the snapshot, monotonic instant for the liveness check.
    last_heartbeat: Option<(OffsetDateTime, Instant)>,
    /// Refreshed by both heartbeats and status reports.
    last_seen: Option<Instant>,
    wifi_rssi: Option<i32>,
    last_updated: Option<OffsetDateTime>,
}

impl DeviceStatus {
    /// Derived, never stored: the device is online iff it said anything
    /// within the heartbeat window. Flips to false purely by elapsed time.
    pub fn is_online(&self) -> bool {
        self.last_seen
            .map_or(false, |seen| seen.elapsed() < HEARTBEAT_TIMEOUT)
    }

    pub(crate) fn record_heartbeat(&mut self, wifi_rssi: Option<i32>) {
        self.last_heartbeat = Some((OffsetDateTime::now_utc(), Instant::now()));
        self.last_seen = Some(Instant::now());
        if wifi_rssi.is_some() {
            self.wifi_rssi = wifi_rssi;
        }
    }

    /// Applies one relay report; returns false when the index is out of range.
    pub(crate) fn set_relay_state(&mut self, relay_number: u8, state: RelayState) -> bool {
        if (1..=RELAY_COUNT as u8).contains(&relay_number) {
            self.relay_states[relay_number as usize - 1] = state;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_status_update(&mut self, wifi_rssi: Option<i32>) {
        if wifi_rssi.is_some() {
            self.wifi_rssi = wifi_rssi;
        }
        self.last_updated = Some(OffsetDateTime::now_utc());
        self.last_seen = Some(Instant::now());
    }

    pub fn relay_state(&self, relay_number: u8) -> Option<RelayState> {
        if (1..=RELAY_COUNT as u8).contains(&relay_number) {
            Some(self.relay_states[relay_number as usize - 1])
        } else {
            None
        }
    }

    /// Read-only view combining stored fields with the derived liveness.
    pub fn snapshot(&self) -> DeviceStatusSnapshot {
        DeviceStatusSnapshot {
            online: self.is_online(),
            relays: self
                .relay_states
                .iter()
                .enumerate()
                .map(|(i, state)| RelaySnapshot {
                    number: i as u8 + 1,
                    name: relay_name(i as u8 + 1),
                    state: *state,
                })
                .collect(),
            last_heartbeat: self.last_heartbeat.and_then(|(ts, _)| rfc3339(ts)),
            wifi_rssi: self.wifi_rssi,
            last_updated: self.last_updated.and_then(rfc3339),
        }
    }
}

fn rfc3339(ts: OffsetDateTime) -> Option<String> {
    ts.format(&Rfc3339).ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct RelaySnapshot {
    pub number: u8,
    pub name: String,
    pub state: RelayState,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatusSnapshot {
    pub online: bool,
    pub relays: Vec<RelaySnapshot>,
    pub last_heartbeat: Option<String>,
    pub wifi_rssi: Option<i32>,
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn fresh_cache_is_offline_with_relays_off() {
        let status = DeviceStatus::default();
        assert!(!status.is_online());
        let snapshot = status.snapshot();
        assert!(!snapshot.online);
        assert_eq!(snapshot.relays.len(), RELAY_COUNT);
        assert!(snapshot.relays.iter().all(|r| r.state == RelayState::Off));
        assert_eq!(snapshot.relays[1].name, "Fan");
        assert!(snapshot.last_heartbeat.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn online_flips_after_heartbeat_window() {
        let mut status = DeviceStatus::default();
        status.record_heartbeat(Some(-55));
        assert!(status.is_online());

        advance(Duration::from_secs(44)).await;
        assert!(status.is_online());

        advance(Duration::from_secs(2)).await;
        assert!(!status.is_online(), "no message for 46s means offline");
    }

    #[tokio::test(start_paused = true)]
    async fn status_report_also_counts_as_liveness() {
        let mut status = DeviceStatus::default();
        status.mark_status_update(Some(-70));
        assert!(status.is_online());
        assert_eq!(status.snapshot().wifi_rssi, Some(-70));

        advance(HEARTBEAT_TIMEOUT + Duration::from_secs(1)).await;
        assert!(!status.is_online());
    }

    #[test]
    fn relay_updates_are_range_checked() {
        let mut status = DeviceStatus::default();
        assert!(status.set_relay_state(1, RelayState::On));
        assert!(status.set_relay_state(4, RelayState::On));
        assert!(!status.set_relay_state(0, RelayState::On));
        assert!(!status.set_relay_state(5, RelayState::On));
        assert_eq!(status.relay_state(1), Some(RelayState::On));
        assert_eq!(status.relay_state(2), Some(RelayState::Off));
        assert_eq!(status.relay_state(5), None);
    }
}
