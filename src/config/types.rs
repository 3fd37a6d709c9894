//! Configuration types

use crate::controller::{
    ControllerSettings, DenyRule, Dpid, GatewayEntry, GatewayTable, Role, RoleRegistry,
    SecurityPolicy,
};
use crate::protocol::{ip_proto, Ipv4Cidr, MacAddr};
use crate::telemetry::LogConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Controller configuration (controller.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_router_mac")]
    pub router_mac: String,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default, rename = "switch")]
    pub switches: Vec<SwitchConfig>,
    /// Named hosts, usable wherever a deny rule takes an address
    #[serde(default)]
    pub hosts: HashMap<String, Ipv4Addr>,
    #[serde(default, rename = "gateway")]
    pub gateways: Vec<GatewayConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
}

fn default_router_mac() -> String {
    "00:00:00:00:00:01".to_string()
}

fn default_prefix_len() -> u8 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchConfig {
    pub dpid: u64,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub address: Ipv4Addr,
    pub port: u16,
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub deny: Vec<DenyConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DenyConfig {
    pub name: Option<String>,
    /// Host name, address or CIDR
    pub src: Option<String>,
    pub dst: Option<String>,
    pub protocol: Option<ProtocolRef>,
    pub priority: Option<u16>,
}

impl DenyConfig {
    pub fn has_filter(&self) -> bool {
        self.src.is_some() || self.dst.is_some() || self.protocol.is_some()
    }
}

/// IP protocol given by name ("icmp") or number (1)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProtocolRef {
    Number(u8),
    Name(String),
}

impl ProtocolRef {
    pub fn number(&self) -> Option<u8> {
        match self {
            ProtocolRef::Number(n) => Some(*n),
            ProtocolRef::Name(name) => ip_proto::parse(name),
        }
    }
}

impl Config {
    pub fn router_mac(&self) -> Result<MacAddr> {
        self.router_mac
            .parse()
            .map_err(|e| Error::Config(format!("router_mac: {}", e)))
    }

    /// Resolve a host name, bare address or CIDR to a network
    pub fn resolve_target(&self, target: &str) -> Result<Ipv4Cidr> {
        if let Some(addr) = self.hosts.get(target) {
            return Ok(Ipv4Cidr::host(*addr));
        }
        target
            .parse()
            .map_err(|_| Error::Config(format!("unknown host or invalid address '{}'", target)))
    }

    fn resolve_deny(&self, index: usize, deny: &DenyConfig) -> Result<DenyRule> {
        let mut rule = DenyRule::new();
        if let Some(name) = &deny.name {
            rule = rule.named(name.clone());
        }
        if let Some(src) = &deny.src {
            rule = rule.from_src(self.resolve_target(src)?);
        }
        if let Some(dst) = &deny.dst {
            rule = rule.to_dst(self.resolve_target(dst)?);
        }
        if let Some(protocol) = &deny.protocol {
            let number = protocol.number().ok_or_else(|| {
                Error::Config(format!(
                    "security.deny[{}]: unknown protocol {:?}",
                    index, protocol
                ))
            })?;
            rule = rule.protocol(number);
        }
        if let Some(priority) = deny.priority {
            rule.priority = priority;
        }
        Ok(rule)
    }

    /// Build the controller's tables. Run `validate` first for readable
    /// diagnostics; this only reports the first problem it hits.
    pub fn resolve(&self) -> Result<ControllerSettings> {
        let router_mac = self.router_mac()?;

        let mut roles = RoleRegistry::new();
        for switch in &self.switches {
            roles.insert(Dpid(switch.dpid), switch.role, switch.name.clone());
        }

        let gateways = self
            .gateways
            .iter()
            .map(|gw| {
                GatewayEntry::new(gw.address, gw.port, gw.prefix_len).ok_or_else(|| {
                    Error::Config(format!(
                        "gateway {}: prefix length {} out of range",
                        gw.address, gw.prefix_len
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rules = self
            .security
            .deny
            .iter()
            .enumerate()
            .map(|(i, deny)| self.resolve_deny(i, deny))
            .collect::<Result<Vec<_>>>()?;

        Ok(ControllerSettings {
            router_mac,
            roles,
            gateways: GatewayTable::new(gateways),
            policy: SecurityPolicy::new(rules),
        })
    }
}
