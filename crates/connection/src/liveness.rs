//! Background liveness monitor.
//!
//! Re-probes every recorded hub on a fixed interval to keep the directory
//! fresh. Probes fan out concurrently — one per hub, no batching cap — and
//! the cycle joins on all-settled semantics: one hub failing never aborts
//! the others. Each cycle publishes exactly one batched `HubsUpdated`.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shuttlelink_discovery::probe;

use crate::reconnection::LinkContext;
use crate::types::{ConnectionState, HubEvent};

/// Runs liveness cycles until cancelled.
pub(crate) async fn liveness_loop(
    ctx: LinkContext,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => run_cycle(&ctx, timeout).await,
        }
    }
}

/// One liveness pass: fan out, join all, batch-update, emit once.
///
/// A no-op when nothing is recorded or nobody is listening.
pub(crate) async fn run_cycle(ctx: &LinkContext, timeout: Duration) {
    if ctx.events_tx.is_closed() {
        return;
    }

    let targets: Vec<Ipv4Addr> = {
        let mut reg = ctx.registry.write().await;
        let targets = reg.recorded_addresses();
        for address in &targets {
            if let Some(entry) = reg.get_mut(*address) {
                // Only quiescent entries flip to Probing; a pending
                // reconnect keeps advertising Reconnecting.
                if entry.transport.is_none()
                    && matches!(
                        entry.state,
                        ConnectionState::Idle | ConnectionState::Disconnected
                    )
                {
                    entry.state = ConnectionState::Probing;
                }
            }
        }
        targets
    };
    if targets.is_empty() {
        return;
    }

    debug!(hubs = targets.len(), "liveness scan");
    let mut probes = JoinSet::new();
    for address in targets {
        let port = ctx.port;
        probes.spawn(async move { (address, probe(address, port, timeout).await) });
    }

    let mut results = Vec::new();
    while let Some(joined) = probes.join_next().await {
        if let Ok(result) = joined {
            results.push(result);
        }
    }

    let records = {
        let mut reg = ctx.registry.write().await;
        for (address, outcome) in results {
            match outcome {
                Ok(record) => reg.upsert_record(record),
                // Keep what we knew, but flag the hub as gone.
                Err(_) => reg.mark_offline(address),
            }
        }
        reg.records()
    };

    let _ = ctx.events_tx.send(HubEvent::HubsUpdated(records)).await;
}
