//! ARP resolution cache (IP to MAC and port)

use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Where a host was last seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub mac: MacAddr,
    pub port: u16,
}

/// Learned bindings, one per IP, last writer wins.
///
/// Entries never expire. This matches the small fixed topology the
/// controller manages; a larger deployment would need aging here.
#[derive(Debug, Clone, Default)]
pub struct ArpCache {
    entries: HashMap<Ipv4Addr, ArpEntry>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<ArpEntry> {
        self.entries.get(&ip).copied()
    }

    /// Insert or overwrite. Returns true if the binding changed.
    pub fn record(&mut self, ip: Ipv4Addr, mac: MacAddr, port: u16) -> bool {
        let entry = ArpEntry { mac, port };
        self.entries.insert(ip, entry) != Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &ArpEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
