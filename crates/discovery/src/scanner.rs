//! Sequential address-range scanner.
//!
//! Probes one address at a time in strictly ascending order — worst case
//! runs for `count × timeout`. Failures are the normal case (most addresses
//! host nothing) and only surface as progress.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::probe::probe;
use crate::types::{ScanEvent, ScanRequest, ScanSummary};

/// Sweeps the request's address range, reporting discoveries and progress
/// on `events`.
///
/// After every probe attempt a `Progress { address, percent }` event is
/// emitted, with percent reaching 100 on the last address. A reversed range
/// completes immediately with zero probes.
pub async fn scan(request: &ScanRequest, events: &mpsc::Sender<ScanEvent>) -> ScanSummary {
    let addresses = request.addresses();
    let count = addresses.len();
    info!(
        start = %request.start,
        end = %request.end,
        count,
        "starting range scan"
    );

    let mut found: u32 = 0;
    for (index, address) in addresses.iter().copied().enumerate() {
        match probe(address, request.port, request.timeout).await {
            Ok(record) => {
                debug!(hub = %address, name = %record.display_name, "hub found");
                found += 1;
                let _ = events.send(ScanEvent::Found(record)).await;
            }
            Err(_) => {
                // Expected for the vast majority of addresses; the probe
                // already traced the cause.
            }
        }
        let percent = (100.0 * (index + 1) as f64 / count as f64).round() as u8;
        let _ = events.send(ScanEvent::Progress { address, percent }).await;
    }

    let summary = ScanSummary {
        probed: count as u32,
        found,
    };
    info!(probed = summary.probed, found = summary.found, "scan complete");
    summary
}
