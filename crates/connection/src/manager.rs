//! Connection manager: the public face of the networking core.
//!
//! Owns the hub registry and drives manual scans, persistent links,
//! reconnect loops, and the liveness monitor. Consumers pull everything
//! from the single event channel returned by [`take_events`]
//! (`ConnectionManager::take_events`).

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shuttlelink_discovery::{HubRecord, ScanEvent, ScanRequest, ScanSummary, scan};
use shuttlelink_protocol::SERVICE_PORT;

use crate::config::CoreConfig;
use crate::liveness::{liveness_loop, run_cycle};
use crate::reconnection::{LinkContext, establish};
use crate::registry::HubRegistry;
use crate::types::{ConnectionError, ConnectionState, HubEvent};

/// Manages discovery and persistent connections for shuttle hubs.
pub struct ConnectionManager {
    config: CoreConfig,
    port: u16,
    registry: Arc<RwLock<HubRegistry>>,
    events_tx: mpsc::Sender<HubEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<HubEvent>>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Creates a manager talking to hubs on the well-known service port.
    pub fn new(config: CoreConfig) -> Self {
        Self::with_port(config, SERVICE_PORT)
    }

    /// Creates a manager with an explicit service port.
    pub fn with_port(config: CoreConfig, port: u16) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            config,
            port,
            registry: Arc::new(RwLock::new(HubRegistry::new())),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<HubEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Snapshot of all known hub records, ordered by address.
    pub async fn hubs(&self) -> Vec<HubRecord> {
        self.registry.read().await.records()
    }

    /// Connection state for an address, if it is known at all.
    pub async fn state(&self, address: Ipv4Addr) -> Option<ConnectionState> {
        self.registry.read().await.state(address)
    }

    /// Runs a manual range scan, superseding all prior scan results.
    ///
    /// Clears the registry first (open links keep their entries), probes the
    /// range one address at a time, forwards progress and discoveries as
    /// events, and finishes with one batched `HubsUpdated` snapshot.
    /// `None` scans the configured default range.
    pub async fn scan(&self, request: Option<ScanRequest>) -> Result<ScanSummary, ConnectionError> {
        let request = match request {
            Some(request) => request,
            None => ScanRequest::parse(
                &self.config.default_scan_range.start,
                &self.config.default_scan_range.end,
                self.port,
                self.config.scan_timeout(),
            )?,
        };

        self.registry.write().await.clear_records();

        let (tx, mut rx) = mpsc::channel::<ScanEvent>(32);
        let registry = self.registry.clone();
        let events_tx = self.events_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ScanEvent::Found(record) => {
                        registry.write().await.upsert_record(record.clone());
                        let _ = events_tx.send(HubEvent::HubFound(record)).await;
                    }
                    ScanEvent::Progress { address, percent } => {
                        let _ = events_tx
                            .send(HubEvent::ScanProgress { address, percent })
                            .await;
                    }
                }
            }
        });

        let summary = scan(&request, &tx).await;
        drop(tx);
        let _ = forward.await;

        let records = self.registry.read().await.records();
        let _ = self.events_tx.send(HubEvent::HubsUpdated(records)).await;
        Ok(summary)
    }

    /// Opens (or replaces) the persistent link to a hub and marks it of
    /// interest. On failure a reconnect loop starts ticking.
    pub async fn connect(&self, address: Ipv4Addr) -> Result<(), ConnectionError> {
        establish(&self.ctx(), address).await
    }

    /// User-initiated disconnect. Destroys the transport and suppresses the
    /// automatic reconnect for this teardown only; the hub stays of
    /// interest.
    pub async fn disconnect(&self, address: Ipv4Addr) {
        let mut reg = self.registry.write().await;
        let Some(entry) = reg.get_mut(address) else {
            return;
        };
        if let Some(timer) = entry.reconnect.take() {
            timer.cancel();
        }
        match entry.transport.as_ref() {
            Some(token) => {
                entry.manual_disconnect = true;
                token.cancel();
                debug!(hub = %address, "manual disconnect");
            }
            None => {
                entry.state = ConnectionState::Disconnected;
            }
        }
    }

    /// Withdraws all interest in a hub: transport destroyed, reconnect timer
    /// cleared, entry removed. Nothing is left dangling.
    pub async fn release(&self, address: Ipv4Addr) {
        let removed = self.registry.write().await.remove(address);
        if let Some(entry) = removed {
            if let Some(token) = entry.transport {
                token.cancel();
            }
            if let Some(timer) = entry.reconnect {
                timer.cancel();
            }
            debug!(hub = %address, "hub released");
            let _ = self.events_tx.send(HubEvent::Disconnected { address }).await;
        }
    }

    /// Sends a command to a hub, applying the configured name remapping.
    ///
    /// Without a live link this reports an `Error` event and returns
    /// `NoActiveConnection` — commands are never dropped silently.
    pub async fn send(&self, address: Ipv4Addr, command: &str) -> Result<(), ConnectionError> {
        let opcode = self.config.command_mappings.resolve(command).to_string();

        let writer = self
            .registry
            .read()
            .await
            .get(address)
            .and_then(|entry| entry.writer.clone());

        if let Some(writer) = writer {
            if writer.send(opcode.clone()).await.is_ok() {
                let _ = self
                    .events_tx
                    .send(HubEvent::LogLine {
                        address,
                        line: format!("[CMD] > {opcode}"),
                    })
                    .await;
                return Ok(());
            }
        }

        let message = format!("cannot send command, no active connection to {address}");
        warn!(hub = %address, command = %command, "{message}");
        let _ = self
            .events_tx
            .send(HubEvent::Error { address, message })
            .await;
        Err(ConnectionError::NoActiveConnection(address))
    }

    /// Runs one liveness cycle on demand.
    pub async fn refresh_hubs(&self) {
        run_cycle(&self.ctx(), self.config.scan_timeout()).await;
    }

    /// Spawns the periodic liveness monitor. Call at most once; it runs
    /// until [`shutdown`](Self::shutdown).
    pub fn start_liveness(&self) {
        tokio::spawn(liveness_loop(
            self.ctx(),
            self.config.liveness_interval(),
            self.config.scan_timeout(),
            self.shutdown.child_token(),
        ));
    }

    /// Stops the liveness monitor and tears down every link and timer.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut reg = self.registry.write().await;
        for address in reg.addresses() {
            if let Some(entry) = reg.get_mut(address) {
                if let Some(token) = entry.transport.take() {
                    token.cancel();
                }
                if let Some(timer) = entry.reconnect.take() {
                    timer.cancel();
                }
            }
        }
        info!("connection manager shut down");
    }

    fn ctx(&self) -> LinkContext {
        LinkContext {
            registry: self.registry.clone(),
            events_tx: self.events_tx.clone(),
            port: self.port,
            reconnect_interval: self.config.reconnect_interval(),
        }
    }
}
