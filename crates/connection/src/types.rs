//! Public types for the hub connection layer.

use std::net::Ipv4Addr;

use shuttlelink_discovery::{HubRecord, ScanError};
use shuttlelink_protocol::TelemetrySnapshot;

/// Connection state for one hub address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Known but no link activity.
    #[default]
    Idle,
    /// A short-lived probe is in flight.
    Probing,
    /// TCP connect in progress.
    Connecting,
    /// Live link established.
    Connected,
    /// Link lost.
    Disconnected,
    /// Link lost, fixed-interval retry timer pending.
    Reconnecting,
}

/// Events emitted to the presentation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// One scan address has been dealt with.
    ScanProgress { address: Ipv4Addr, percent: u8 },
    /// A manual scan found a hub.
    HubFound(HubRecord),
    /// Batched snapshot of every known hub (end of scan, end of liveness cycle).
    HubsUpdated(Vec<HubRecord>),
    /// A persistent link came up.
    Connected { address: Ipv4Addr },
    /// A persistent link went down (peer close, error, or user action).
    Disconnected { address: Ipv4Addr },
    /// Telemetry received on a live link.
    Telemetry {
        address: Ipv4Addr,
        snapshot: TelemetrySnapshot,
    },
    /// Free-text diagnostic line from a hub, verbatim.
    LogLine { address: Ipv4Addr, line: String },
    /// A request against a hub failed (e.g. send without a live link).
    Error { address: Ipv4Addr, message: String },
}

/// Errors surfaced by the connection manager.
///
/// None of these are fatal to the host: link failures feed the reconnect
/// loop, probe failures feed the offline path.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("no active connection to {0}")]
    NoActiveConnection(Ipv4Addr),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),
}
