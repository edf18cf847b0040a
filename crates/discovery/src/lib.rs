//! Hub discovery: single-address probing and sequential range scanning.

pub mod probe;
pub mod scanner;
pub mod types;

pub use probe::{ProbeError, probe};
pub use scanner::scan;
pub use types::{
    HubRecord, STATUS_OFFLINE, STATUS_UNKNOWN, ScanEvent, ScanRequest, ScanSummary,
};

/// Errors for scan setup.
///
/// A reversed range is not an error — it yields an empty scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid scan address: {0}")]
    InvalidAddress(String),
}
