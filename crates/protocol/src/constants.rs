//! Protocol constants shared by the probe, codec, and connection layers.

use std::time::Duration;

/// Prefix that marks a structured telemetry line.
///
/// Everything after the first `{` on such a line is a JSON object.
pub const TELEMETRY_MARKER: &str = "##TELEMETRY##:";

/// Well-known TCP port of the hub telemetry/log service.
pub const SERVICE_PORT: u16 = 3333;

/// Default timeout for a single discovery probe.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(500);

/// Default interval between reconnect attempts for a dropped link.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(4000);

/// Default interval between background liveness scans.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default manual scan range (first and last address, last octet varies).
pub const DEFAULT_SCAN_RANGE: (&str, &str) = ("192.168.1.1", "192.168.1.255");
