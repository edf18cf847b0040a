//! Address-keyed directory of known hubs.
//!
//! One [`Connection`] record per address aggregates everything the core
//! tracks about a hub: its state, the live transport handle, the pending
//! reconnect timer, and the last telemetry-derived record. A single map
//! cannot drift out of sync the way parallel socket/timer/record tables can.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shuttlelink_discovery::HubRecord;

use crate::types::ConnectionState;

/// Everything tracked for one hub address.
#[derive(Debug, Default)]
pub(crate) struct Connection {
    pub state: ConnectionState,
    /// The consumer still cares about this hub (its view is open).
    pub watched: bool,
    /// Set by an explicit user disconnect so the transport teardown does not
    /// schedule a reconnect. Consumed by the teardown.
    pub manual_disconnect: bool,
    /// Outbound command channel into the write pump.
    pub writer: Option<mpsc::Sender<String>>,
    /// Cancels the read/write pumps of the live transport.
    pub transport: Option<CancellationToken>,
    /// Cancels the pending reconnect loop. At most one per address.
    pub reconnect: Option<CancellationToken>,
    /// Bumped for every new transport; stale pump teardowns compare it and
    /// no-op instead of clobbering a replacement link.
    pub generation: u64,
    pub record: Option<HubRecord>,
}

/// The directory itself. Owned exclusively by the connection manager.
#[derive(Debug, Default)]
pub struct HubRegistry {
    entries: HashMap<Ipv4Addr, Connection>,
}

impl HubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entry_mut(&mut self, address: Ipv4Addr) -> &mut Connection {
        self.entries.entry(address).or_default()
    }

    pub(crate) fn get(&self, address: Ipv4Addr) -> Option<&Connection> {
        self.entries.get(&address)
    }

    pub(crate) fn get_mut(&mut self, address: Ipv4Addr) -> Option<&mut Connection> {
        self.entries.get_mut(&address)
    }

    pub(crate) fn remove(&mut self, address: Ipv4Addr) -> Option<Connection> {
        self.entries.remove(&address)
    }

    /// Inserts or refreshes the hub record for an address.
    pub(crate) fn upsert_record(&mut self, record: HubRecord) {
        let entry = self.entry_mut(record.address);
        if entry.transport.is_none() && entry.state == ConnectionState::Probing {
            entry.state = ConnectionState::Idle;
        }
        entry.record = Some(record);
    }

    /// Keeps the entry but flags its record offline after a failed re-probe.
    pub(crate) fn mark_offline(&mut self, address: Ipv4Addr) {
        if let Some(entry) = self.entries.get_mut(&address) {
            if entry.transport.is_none() && entry.state == ConnectionState::Probing {
                entry.state = ConnectionState::Idle;
            }
            if let Some(record) = entry.record.as_mut() {
                record.mark_offline();
            }
        }
    }

    /// Every known address, recorded or not.
    pub(crate) fn addresses(&self) -> Vec<Ipv4Addr> {
        self.entries.keys().copied().collect()
    }

    /// Addresses that currently carry a hub record.
    pub(crate) fn recorded_addresses(&self) -> Vec<Ipv4Addr> {
        let mut addrs: Vec<Ipv4Addr> = self
            .entries
            .iter()
            .filter(|(_, e)| e.record.is_some())
            .map(|(a, _)| *a)
            .collect();
        addrs.sort_unstable();
        addrs
    }

    /// Snapshot of all hub records, ordered by address.
    pub fn records(&self) -> Vec<HubRecord> {
        let mut records: Vec<HubRecord> = self
            .entries
            .values()
            .filter_map(|e| e.record.clone())
            .collect();
        records.sort_unstable_by_key(|r| r.address);
        records
    }

    /// Clears scan results ahead of a fresh manual scan.
    ///
    /// Entries with an open consumer view keep their link state but lose the
    /// stale record; everything else is dropped. Unwatched entries never own
    /// a transport or a timer, so dropping them leaks nothing.
    pub fn clear_records(&mut self) {
        self.entries.retain(|_, e| e.watched);
        for entry in self.entries.values_mut() {
            entry.record = None;
        }
    }

    pub fn state(&self, address: Ipv4Addr) -> Option<ConnectionState> {
        self.entries.get(&address).map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
