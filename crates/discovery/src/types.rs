use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shuttlelink_protocol::TelemetrySnapshot;

use crate::ScanError;

/// Status assigned when a hub carries no status field.
pub const STATUS_UNKNOWN: &str = "Unknown";

/// Status assigned when a known hub stops answering probes.
pub const STATUS_OFFLINE: &str = "Offline";

/// A known hub, keyed by address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubRecord {
    pub address: Ipv4Addr,
    pub display_name: String,
    pub status: String,
    pub battery_percent: u8,
    pub last_seen: DateTime<Utc>,
}

impl HubRecord {
    /// Builds a record from a freshly captured telemetry snapshot.
    ///
    /// Every telemetry field is optional: the display name falls back to the
    /// address, the status to [`STATUS_UNKNOWN`], the battery to 0.
    pub fn from_snapshot(address: Ipv4Addr, snapshot: &TelemetrySnapshot) -> Self {
        let display_name = match snapshot.shuttle() {
            Some(id) => format!("Shuttle {id}"),
            None => format!("Shuttle {address}"),
        };
        let battery_percent = snapshot
            .batt()
            .map_or(0, |b| b.clamp(0.0, 100.0).round() as u8);
        Self {
            address,
            display_name,
            status: snapshot.status_str().unwrap_or(STATUS_UNKNOWN).to_string(),
            battery_percent,
            last_seen: Utc::now(),
        }
    }

    /// Marks the hub offline, keeping the rest of the record.
    pub fn mark_offline(&mut self) {
        self.status = STATUS_OFFLINE.to_string();
    }
}

/// Parameters for one manual range scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
    pub port: u16,
    pub timeout: Duration,
}

impl ScanRequest {
    /// Validates dotted-quad endpoints and builds a request.
    pub fn parse(
        start: &str,
        end: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, ScanError> {
        let start: Ipv4Addr = start
            .parse()
            .map_err(|_| ScanError::InvalidAddress(start.to_string()))?;
        let end: Ipv4Addr = end
            .parse()
            .map_err(|_| ScanError::InvalidAddress(end.to_string()))?;
        Ok(Self {
            start,
            end,
            port,
            timeout,
        })
    }

    /// The addresses to probe, strictly ascending.
    ///
    /// Only the last octet varies; the first three octets come from `start`.
    /// A reversed range yields no addresses.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        let [a, b, c, first] = self.start.octets();
        let last = self.end.octets()[3];
        (first..=last).map(|d| Ipv4Addr::new(a, b, c, d)).collect()
    }
}

/// Incremental scan notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A hub answered with valid telemetry.
    Found(HubRecord),
    /// One address has been dealt with (hub or not).
    Progress { address: Ipv4Addr, percent: u8 },
}

/// Terminal result of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub probed: u32,
    pub found: u32,
}
