//! Telemetry snapshot type.
//!
//! A hub's telemetry is an open JSON object — the field set varies between
//! firmware revisions, so nothing here is required. Accessors exist for the
//! fields hubs emit by convention; every one of them returns `Option`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structured telemetry snapshot from a hub.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot(pub Map<String, Value>);

impl TelemetrySnapshot {
    /// Parses a snapshot from the JSON portion of a telemetry line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let map: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self(map))
    }

    /// Raw field access.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Human-readable status string (`status_str`).
    pub fn status_str(&self) -> Option<&str> {
        self.0.get("status_str").and_then(Value::as_str)
    }

    /// Battery percentage (`batt`).
    pub fn batt(&self) -> Option<f64> {
        self.0.get("batt").and_then(Value::as_f64)
    }

    /// Identifying shuttle number (`shuttle`).
    pub fn shuttle(&self) -> Option<i64> {
        self.0.get("shuttle").and_then(Value::as_i64)
    }

    /// Supply voltage (`voltage`).
    pub fn voltage(&self) -> Option<f64> {
        self.0.get("voltage").and_then(Value::as_f64)
    }

    /// Error code (`err`), zero or absent when healthy.
    pub fn err_code(&self) -> Option<i64> {
        self.0.get("err").and_then(Value::as_i64)
    }

    /// Warning code (`warn`), zero or absent when healthy.
    pub fn warn_code(&self) -> Option<i64> {
        self.0.get("warn").and_then(Value::as_i64)
    }
}
