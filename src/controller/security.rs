//! Security policy set
//!
//! Data-driven deny list installed on router-role switches above every
//! forwarding and trap rule. The router also consults it before acting
//! on a packet-in, so traffic that slipped past the switch while the
//! denies were propagating is still refused.

use super::flow_rule::{priority, FlowMatch, FlowRule, PacketKey};
use crate::protocol::{ip_proto, Ipv4Cidr};
use std::net::Ipv4Addr;

/// One deny entry; unset filters are wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyRule {
    pub name: Option<String>,
    pub src: Option<Ipv4Cidr>,
    pub dst: Option<Ipv4Cidr>,
    pub protocol: Option<u8>,
    pub priority: u16,
}

impl DenyRule {
    pub fn new() -> Self {
        Self {
            name: None,
            src: None,
            dst: None,
            protocol: None,
            priority: priority::SECURITY_DENY,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_src(mut self, src: Ipv4Cidr) -> Self {
        self.src = Some(src);
        self
    }

    pub fn to_dst(mut self, dst: Ipv4Cidr) -> Self {
        self.dst = Some(dst);
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn flow_match(&self) -> FlowMatch {
        FlowMatch {
            ip_proto: self.protocol,
            src_ip: self.src,
            dst_ip: self.dst,
            ..FlowMatch::ipv4()
        }
    }

    /// The drop rule that enforces this entry in the dataplane
    pub fn to_flow_rule(&self) -> FlowRule {
        FlowRule::drop(self.flow_match(), self.priority)
    }
}

impl Default for DenyRule {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
    rules: Vec<DenyRule>,
}

impl SecurityPolicy {
    pub fn new(rules: Vec<DenyRule>) -> Self {
        Self { rules }
    }

    /// The two denies of the reference topology: no ICMP from the
    /// untrusted host, and no IPv4 at all from it to the protected server.
    pub fn untrusted_host(untrusted: Ipv4Addr, protected: Ipv4Addr) -> Self {
        Self::new(vec![
            DenyRule::new()
                .named("untrusted-icmp")
                .from_src(Ipv4Cidr::host(untrusted))
                .protocol(ip_proto::ICMP),
            DenyRule::new()
                .named("untrusted-to-server")
                .from_src(Ipv4Cidr::host(untrusted))
                .to_dst(Ipv4Cidr::host(protected)),
        ])
    }

    pub fn rules(&self) -> &[DenyRule] {
        &self.rules
    }

    pub fn flow_rules(&self) -> Vec<FlowRule> {
        self.rules.iter().map(DenyRule::to_flow_rule).collect()
    }

    /// First deny entry that matches the packet, if any
    pub fn denies(&self, key: &PacketKey) -> Option<&DenyRule> {
        self.rules.iter().find(|r| r.flow_match().matches(key))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
