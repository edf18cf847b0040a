//! Wire protocol for the shuttle hub telemetry/log service.
//!
//! Hubs speak a plaintext, line-delimited TCP protocol: telemetry lines
//! carry a marker prefix followed by a JSON object, everything else is a
//! free-text log line.

pub mod codec;
pub mod commands;
pub mod constants;
pub mod telemetry;

pub use codec::{Line, LineCodec};
pub use commands::CommandMap;
pub use constants::{SERVICE_PORT, TELEMETRY_MARKER};
pub use telemetry::TelemetrySnapshot;
