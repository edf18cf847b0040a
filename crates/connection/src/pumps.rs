//! Read and write pumps for a live hub link.
//!
//! One pair per transport. The read pump feeds raw bytes through the line
//! codec and publishes decoded events; when its stream ends — peer close,
//! error, or cancellation — it runs the shared teardown. The write pump
//! drains the outbound command channel.

use std::net::Ipv4Addr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use shuttlelink_discovery::HubRecord;
use shuttlelink_protocol::codec::{Line, LineCodec};

use crate::reconnection::{LinkContext, on_transport_closed};
use crate::types::HubEvent;

/// Consumes the hub byte stream until the link dies.
///
/// Partial lines are buffered in the codec across reads; chunking on the
/// wire is invisible to consumers.
pub(crate) async fn read_pump(
    address: Ipv4Addr,
    mut read_half: OwnedReadHalf,
    ctx: LinkContext,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut codec = LineCodec::new();
    let mut chunk = [0u8; 2048];

    let was_cancelled = loop {
        tokio::select! {
            _ = cancel.cancelled() => break true,

            result = read_half.read(&mut chunk) => match result {
                Ok(0) => {
                    debug!(hub = %address, "connection closed by peer");
                    break false;
                }
                Ok(n) => {
                    for line in codec.feed(&chunk[..n]) {
                        handle_line(address, line, &ctx).await;
                    }
                }
                Err(e) => {
                    warn!(hub = %address, error = %e, "read error");
                    break false;
                }
            }
        }
    };

    on_transport_closed(&ctx, address, generation, was_cancelled).await;
}

/// Publishes one decoded line and refreshes the registry on telemetry.
async fn handle_line(address: Ipv4Addr, line: Line, ctx: &LinkContext) {
    match line {
        Line::Telemetry(snapshot) => {
            trace!(hub = %address, "telemetry");
            let record = HubRecord::from_snapshot(address, &snapshot);
            ctx.registry.write().await.upsert_record(record);
            let _ = ctx
                .events_tx
                .send(HubEvent::Telemetry { address, snapshot })
                .await;
        }
        Line::Log(line) => {
            let _ = ctx.events_tx.send(HubEvent::LogLine { address, line }).await;
        }
        Line::Malformed { raw } => {
            // Garbled telemetry degrades to a log line; the link stays up.
            let _ = ctx
                .events_tx
                .send(HubEvent::LogLine {
                    address,
                    line: format!("[ERROR] failed to parse telemetry: {raw}"),
                })
                .await;
        }
    }
}

/// Writes newline-terminated commands until cancelled or the channel closes.
pub(crate) async fn write_pump(
    address: Ipv4Addr,
    mut write_half: OwnedWriteHalf,
    mut commands: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            command = commands.recv() => match command {
                Some(command) => {
                    let line = format!("{command}\n");
                    if let Err(e) = write_half.write_all(line.as_bytes()).await {
                        warn!(hub = %address, error = %e, "write error");
                        break;
                    }
                    trace!(hub = %address, command = %command, "command written");
                }
                None => break,
            }
        }
    }
    let _ = write_half.shutdown().await;
}
