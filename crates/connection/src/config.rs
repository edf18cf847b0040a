//! Configuration consumed by the connection core.
//!
//! The host loads and owns the file; the core only consumes the parsed
//! values. Field names match the deployed `config.json` schema, and every
//! field falls back to the stock defaults when absent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use shuttlelink_protocol::CommandMap;
use shuttlelink_protocol::constants::{
    DEFAULT_LIVENESS_INTERVAL, DEFAULT_RECONNECT_INTERVAL, DEFAULT_SCAN_RANGE,
    DEFAULT_SCAN_TIMEOUT,
};

/// Default address range for a manual scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRangeConfig {
    pub start: String,
    pub end: String,
}

impl Default for ScanRangeConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_SCAN_RANGE.0.to_string(),
            end: DEFAULT_SCAN_RANGE.1.to_string(),
        }
    }
}

/// Tunables for the networking core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    pub default_scan_range: ScanRangeConfig,
    /// Probe timeout in milliseconds (scans and liveness checks).
    #[serde(rename = "defaultScanTimeout")]
    pub scan_timeout_ms: u64,
    /// Delay between reconnect attempts in milliseconds.
    #[serde(rename = "reconnectInterval")]
    pub reconnect_interval_ms: u64,
    /// Delay between background liveness scans in milliseconds.
    #[serde(rename = "dashboardRescanInterval")]
    pub liveness_interval_ms: u64,
    pub command_mappings: CommandMap,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_scan_range: ScanRangeConfig::default(),
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT.as_millis() as u64,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL.as_millis() as u64,
            liveness_interval_ms: DEFAULT_LIVENESS_INTERVAL.as_millis() as u64,
            command_mappings: CommandMap::default(),
        }
    }
}

impl CoreConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }
}
