//! IPv4 prefixes

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 network prefix, stored with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Cidr {
    /// Build a prefix; returns `None` when `prefix_len > 32`
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Option<Self> {
        if prefix_len > 32 {
            return None;
        }
        let network = Ipv4Addr::from(u32::from(addr) & Self::mask(prefix_len));
        Some(Self {
            addr: network,
            prefix_len,
        })
    }

    /// A /32 covering exactly one address
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            prefix_len: 32,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = Self::mask(self.prefix_len);
        u32::from(addr) & mask == u32::from(self.addr)
    }

    /// True if the two prefixes share at least one address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains(other.addr) || other.contains(self.addr)
    }

    fn mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - prefix_len)
        }
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix_len == 32 {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.prefix_len)
        }
    }
}

impl FromStr for Ipv4Cidr {
    type Err = String;

    /// Parses "10.0.1.0/24" or a bare address (taken as /32)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, len)) => {
                let addr: Ipv4Addr = addr.parse().map_err(|_| format!("invalid address: {s}"))?;
                let len: u8 = len.parse().map_err(|_| format!("invalid prefix: {s}"))?;
                Ipv4Cidr::new(addr, len).ok_or_else(|| format!("prefix too long: {s}"))
            }
            None => s
                .parse()
                .map(Ipv4Cidr::host)
                .map_err(|_| format!("invalid address: {s}")),
        }
    }
}
