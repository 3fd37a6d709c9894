//! Configuration validation

use super::Config;
use crate::controller::{priority, Role};
use crate::protocol::{Ipv4Cidr, MacAddr};
use crate::telemetry::{is_valid_format, is_valid_level};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_router_mac(config, &mut result);
    validate_logging(config, &mut result);
    validate_switches(config, &mut result);
    validate_gateways(config, &mut result);
    validate_security(config, &mut result);

    result
}

fn validate_router_mac(config: &Config, result: &mut ValidationResult) {
    match config.router_mac.parse::<MacAddr>() {
        Ok(mac) if mac.is_multicast() => {
            result.error(format!("router_mac: {} is a multicast address", mac));
        }
        Ok(mac) if mac == MacAddr::ZERO => {
            result.warn("router_mac: all-zero address");
        }
        Ok(_) => {}
        Err(e) => result.error(format!("router_mac: {}", e)),
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    if !is_valid_level(&config.logging.level) {
        result.error(format!(
            "logging.level: unknown level '{}'",
            config.logging.level
        ));
    }
    if !is_valid_format(&config.logging.format) {
        result.error(format!(
            "logging.format: unknown format '{}'",
            config.logging.format
        ));
    }
}

fn validate_switches(config: &Config, result: &mut ValidationResult) {
    if config.switches.is_empty() {
        result.warn("switch: no switches configured, every connection will be refused");
        return;
    }

    let mut seen = HashSet::new();
    for switch in &config.switches {
        if !seen.insert(switch.dpid) {
            result.error(format!("switch: dpid {} defined more than once", switch.dpid));
        }
    }

    if !config.switches.iter().any(|s| s.role == Role::CoreRouter) {
        result.warn("switch: no core-router switch, packet-ins will be ignored");
    }

    let routes = config
        .switches
        .iter()
        .any(|s| matches!(s.role, Role::CoreRouter | Role::StaticRouter));
    if routes && config.gateways.is_empty() {
        result.warn("gateway: router switches configured without any gateway");
    }
}

fn validate_gateways(config: &Config, result: &mut ValidationResult) {
    let mut subnets: Vec<(usize, Ipv4Cidr)> = Vec::new();
    let mut addresses = HashSet::new();

    for (i, gw) in config.gateways.iter().enumerate() {
        if gw.port == 0 {
            result.error(format!("gateway[{}]: port 0 is not a valid switch port", i));
        }
        if !addresses.insert(gw.address) {
            result.error(format!(
                "gateway[{}]: address {} defined more than once",
                i, gw.address
            ));
        }

        let Some(subnet) = Ipv4Cidr::new(gw.address, gw.prefix_len) else {
            result.error(format!(
                "gateway[{}]: prefix length {} exceeds 32",
                i, gw.prefix_len
            ));
            continue;
        };

        for (j, other) in &subnets {
            if subnet.overlaps(other) {
                result.warn(format!(
                    "gateway[{}]: subnet {} overlaps gateway[{}] subnet {}, longest prefix wins",
                    i, subnet, j, other
                ));
            }
        }
        subnets.push((i, subnet));
    }
}

fn validate_security(config: &Config, result: &mut ValidationResult) {
    for (i, deny) in config.security.deny.iter().enumerate() {
        if !deny.has_filter() {
            result.error(format!(
                "security.deny[{}]: no src, dst or protocol given, would drop all IPv4",
                i
            ));
        }

        for (field, target) in [("src", &deny.src), ("dst", &deny.dst)] {
            if let Some(target) = target {
                if config.resolve_target(target).is_err() {
                    result.error(format!(
                        "security.deny[{}].{}: unknown host or invalid address '{}'",
                        i, field, target
                    ));
                }
            }
        }

        if let Some(protocol) = &deny.protocol {
            if protocol.number().is_none() {
                result.error(format!(
                    "security.deny[{}].protocol: unknown protocol {:?}",
                    i, protocol
                ));
            }
        }

        match deny.priority {
            Some(p) if p <= priority::FORWARD => {
                result.error(format!(
                    "security.deny[{}].priority: {} must be above forwarding priority {}",
                    i,
                    p,
                    priority::FORWARD
                ));
            }
            Some(_) => {}
            None => result.warn(format!(
                "security.deny[{}]: priority not specified, using default {}",
                i,
                priority::SECURITY_DENY
            )),
        }
    }
}
