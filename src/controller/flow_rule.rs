//! Flow rules handed to the dataplane
//!
//! A rule is a partial match, a priority and an ordered action list.
//! An empty action list drops matching traffic. Overlapping rules are
//! resolved by the dataplane: the highest priority wins.

use crate::protocol::ethernet::Frame;
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::{EtherType, Ipv4Cidr, MacAddr};
use std::fmt;
use std::net::Ipv4Addr;

/// Priority ladder for everything the controller installs.
///
/// Security denies must beat forwarding rules, which must beat the
/// controller traps; the wildcard flood sits at the bottom.
pub mod priority {
    pub const SECURITY_DENY: u16 = 20;
    /// Firewall role: traffic let through ahead of its IPv4 drop
    pub const FIREWALL_ALLOW: u16 = 20;
    pub const FORWARD: u16 = 15;
    pub const CONTROLLER_TRAP: u16 = 10;
    pub const STATIC_ROUTE: u16 = 10;
    pub const DEFAULT: u16 = 0;
}

/// Match fields; `None` is a wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowMatch {
    pub eth_type: Option<EtherType>,
    pub ip_proto: Option<u8>,
    pub src_ip: Option<Ipv4Cidr>,
    pub dst_ip: Option<Ipv4Cidr>,
}

impl FlowMatch {
    /// Matches every frame
    pub fn any() -> Self {
        Self::default()
    }

    pub fn eth_type(eth_type: EtherType) -> Self {
        Self {
            eth_type: Some(eth_type),
            ..Self::default()
        }
    }

    pub fn ipv4() -> Self {
        Self::eth_type(EtherType::Ipv4)
    }

    pub fn with_ip_proto(mut self, proto: u8) -> Self {
        self.ip_proto = Some(proto);
        self
    }

    pub fn with_src(mut self, src: Ipv4Cidr) -> Self {
        self.src_ip = Some(src);
        self
    }

    pub fn with_dst(mut self, dst: Ipv4Cidr) -> Self {
        self.dst_ip = Some(dst);
        self
    }

    pub fn is_wildcard(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate against a packet's header fields.
    ///
    /// IP fields never match a frame that carries no IPv4 header.
    pub fn matches(&self, key: &PacketKey) -> bool {
        if let Some(eth_type) = self.eth_type {
            if key.eth_type != eth_type as u16 {
                return false;
            }
        }

        let needs_ip = self.ip_proto.is_some() || self.src_ip.is_some() || self.dst_ip.is_some();
        if !needs_ip {
            return true;
        }

        let Some(ip) = key.ipv4 else {
            return false;
        };
        self.ip_proto.map_or(true, |p| p == ip.protocol)
            && self.src_ip.map_or(true, |net| net.contains(ip.src))
            && self.dst_ip.map_or(true, |net| net.contains(ip.dst))
    }
}

/// Header fields a rule can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketKey {
    pub eth_type: u16,
    pub ipv4: Option<Ipv4Key>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Key {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

impl PacketKey {
    pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Self {
        Self {
            eth_type: EtherType::Ipv4 as u16,
            ipv4: Some(Ipv4Key { src, dst, protocol }),
        }
    }

    pub fn arp() -> Self {
        Self {
            eth_type: EtherType::Arp as u16,
            ipv4: None,
        }
    }

    /// Match fields of a raw frame; None if it is not even Ethernet
    pub fn from_frame(bytes: &[u8]) -> Option<Self> {
        let frame = Frame::parse(bytes).ok()?;
        let key = match EtherType::from_u16(frame.ethertype()) {
            Some(EtherType::Arp) => Self::arp(),
            Some(EtherType::Ipv4) => match Ipv4Header::parse(frame.payload()) {
                Ok(h) => Self::ipv4(h.src_addr(), h.dst_addr(), h.protocol()),
                // Truncated header: only eth_type rules can match
                Err(_) => Self {
                    eth_type: frame.ethertype(),
                    ipv4: None,
                },
            },
            None => Self {
                eth_type: frame.ethertype(),
                ipv4: None,
            },
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// Out every port except the ingress port
    Flood,
    Output(u16),
    SetSrcMac(MacAddr),
    SetDstMac(MacAddr),
    SendToController,
}

/// A rule as sent in one installation call; never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    pub matching: FlowMatch,
    pub priority: u16,
    pub actions: Vec<FlowAction>,
}

impl FlowRule {
    pub fn new(matching: FlowMatch, priority: u16, actions: Vec<FlowAction>) -> Self {
        Self {
            matching,
            priority,
            actions,
        }
    }

    /// A rule with no actions
    pub fn drop(matching: FlowMatch, priority: u16) -> Self {
        Self::new(matching, priority, Vec::new())
    }

    pub fn is_drop(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        match self.eth_type {
            Some(EtherType::Ipv4) => fields.push("ip".to_string()),
            Some(EtherType::Arp) => fields.push("arp".to_string()),
            None => {}
        }
        if let Some(proto) = self.ip_proto {
            fields.push(format!("nw_proto={proto}"));
        }
        if let Some(src) = self.src_ip {
            fields.push(format!("nw_src={src}"));
        }
        if let Some(dst) = self.dst_ip {
            fields.push(format!("nw_dst={dst}"));
        }
        if fields.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", fields.join(","))
        }
    }
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowAction::Flood => write!(f, "FLOOD"),
            FlowAction::Output(port) => write!(f, "output:{port}"),
            FlowAction::SetSrcMac(mac) => write!(f, "mod_dl_src:{mac}"),
            FlowAction::SetDstMac(mac) => write!(f, "mod_dl_dst:{mac}"),
            FlowAction::SendToController => write!(f, "CONTROLLER"),
        }
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "priority={},{} actions=", self.priority, self.matching)?;
        if self.actions.is_empty() {
            return write!(f, "drop");
        }
        let actions: Vec<String> = self.actions.iter().map(ToString::to_string).collect();
        write!(f, "{}", actions.join(","))
    }
}
