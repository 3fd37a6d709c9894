//! Gateway/subnet table
//!
//! Static map of the router's gateway addresses to their egress port and
//! attached subnet. Built once from configuration, read-only afterwards.

use crate::protocol::Ipv4Cidr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayEntry {
    /// Router-owned address on the subnet
    pub gateway_ip: Ipv4Addr,
    /// Router port facing the subnet
    pub port: u16,
    pub subnet: Ipv4Cidr,
}

impl GatewayEntry {
    /// `None` if `prefix_len > 32`
    pub fn new(gateway_ip: Ipv4Addr, port: u16, prefix_len: u8) -> Option<Self> {
        Some(Self {
            gateway_ip,
            port,
            subnet: Ipv4Cidr::new(gateway_ip, prefix_len)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayTable {
    /// Longest prefix first
    entries: Vec<GatewayEntry>,
}

impl GatewayTable {
    pub fn new(entries: impl IntoIterator<Item = GatewayEntry>) -> Self {
        let mut entries: Vec<GatewayEntry> = entries.into_iter().collect();
        // stable: equal prefixes keep configuration order
        entries.sort_by(|a, b| b.subnet.prefix_len().cmp(&a.subnet.prefix_len()));
        Self { entries }
    }

    /// Entry whose subnet contains `ip`, most specific first
    pub fn resolve_egress(&self, ip: Ipv4Addr) -> Option<&GatewayEntry> {
        self.entries.iter().find(|e| e.subnet.contains(ip))
    }

    /// Entry owning `ip` as its gateway address
    pub fn gateway(&self, ip: Ipv4Addr) -> Option<&GatewayEntry> {
        self.entries.iter().find(|e| e.gateway_ip == ip)
    }

    pub fn is_gateway(&self, ip: Ipv4Addr) -> bool {
        self.gateway(ip).is_some()
    }

    pub fn entries(&self) -> &[GatewayEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
