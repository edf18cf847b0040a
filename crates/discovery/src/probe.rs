//! Short-lived diagnostic probe against one address.
//!
//! A probe connects, waits for the first newline-terminated line, and
//! classifies the peer. Exactly one outcome is possible by construction:
//! the entire attempt is a single future inside one deadline, and the
//! socket is owned by that future — once it returns, later data, close, or
//! error events have nothing left to resolve.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::trace;

use shuttlelink_protocol::codec::{Line, classify};

use crate::types::HubRecord;

/// Why a probed address is not (currently) a usable hub.
///
/// All of these are expected outcomes during a scan — callers trace them at
/// most, they never bubble up as application errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out waiting for telemetry")]
    Timeout,

    #[error("service answered but is not a hub")]
    NotAHub,

    #[error("malformed telemetry in first line")]
    MalformedTelemetry,

    #[error("connection closed before a full line arrived")]
    ClosedPrematurely,

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Probes `address:port`, resolving with a [`HubRecord`] iff the first line
/// received within `timeout` is a telemetry line with valid embedded JSON.
///
/// The deadline covers the connect as well as the wait for the first line.
pub async fn probe(
    address: Ipv4Addr,
    port: u16,
    timeout: Duration,
) -> Result<HubRecord, ProbeError> {
    let outcome = match tokio::time::timeout(timeout, first_line(address, port)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout),
    };
    if let Err(ref e) = outcome {
        trace!(hub = %address, error = %e, "probe failed");
    }
    outcome
}

/// Connects and classifies the first complete line.
async fn first_line(address: Ipv4Addr, port: u16) -> Result<HubRecord, ProbeError> {
    let mut stream = TcpStream::connect((address, port)).await?;
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProbeError::ClosedPrematurely);
        }
        buffer.extend_from_slice(&chunk[..n]);

        let Some(boundary) = buffer.iter().position(|&b| b == b'\n') else {
            continue;
        };
        let raw = String::from_utf8_lossy(&buffer[..boundary]);

        return match classify(raw.trim()) {
            Line::Telemetry(snapshot) => Ok(HubRecord::from_snapshot(address, &snapshot)),
            Line::Malformed { .. } => Err(ProbeError::MalformedTelemetry),
            Line::Log(_) => Err(ProbeError::NotAHub),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const LOCALHOST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);
    const TIMEOUT: Duration = Duration::from_millis(500);

    /// Binds a listener that answers each connection with `reply` bytes.
    async fn fake_hub(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(reply).await;
                let _ = socket.flush().await;
                // Hold the socket open briefly so the close never races the read.
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn valid_telemetry_yields_record() {
        let port = fake_hub(b"##TELEMETRY##:{\"shuttle\":3,\"status_str\":\"Idle\",\"batt\":77}\n")
            .await;
        let record = probe(LOCALHOST, port, TIMEOUT).await.unwrap();
        assert_eq!(record.address, LOCALHOST);
        assert_eq!(record.display_name, "Shuttle 3");
        assert_eq!(record.status, "Idle");
        assert_eq!(record.battery_percent, 77);
    }

    #[tokio::test]
    async fn split_first_line_is_reassembled() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"##TELEME").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            socket.write_all(b"TRY##:{\"batt\":10}\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let record = probe(LOCALHOST, port, TIMEOUT).await.unwrap();
        assert_eq!(record.battery_percent, 10);
    }

    #[tokio::test]
    async fn non_hub_line_fails_not_a_hub() {
        let port = fake_hub(b"SSH-2.0-OpenSSH_9.6\n").await;
        let err = probe(LOCALHOST, port, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProbeError::NotAHub));
    }

    #[tokio::test]
    async fn bad_json_fails_malformed() {
        let port = fake_hub(b"##TELEMETRY##:{bad json\n").await;
        let err = probe(LOCALHOST, port, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProbeError::MalformedTelemetry));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let port = fake_hub(b"").await;
        let err = probe(LOCALHOST, port, Duration::from_millis(100))
            .await
            .unwrap_err();
        // A peer that writes nothing either times us out or closes first;
        // both are failure outcomes, never a record.
        assert!(matches!(
            err,
            ProbeError::Timeout | ProbeError::ClosedPrematurely
        ));
    }

    #[tokio::test]
    async fn early_close_fails_prematurely() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });
        let err = probe(LOCALHOST, port, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProbeError::ClosedPrematurely));
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        // Grab an ephemeral port, then free it so nothing is listening.
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = probe(LOCALHOST, port, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}
