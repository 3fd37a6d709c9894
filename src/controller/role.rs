//! Switch roles
//!
//! Every datapath id maps to exactly one role, fixed for the lifetime of
//! its connection. The role decides which static rules the switch gets on
//! connect and whether its packet-ins reach the router state machine.

use super::flow_rule::{priority, FlowAction, FlowMatch, FlowRule};
use super::{Dpid, GatewayTable, SecurityPolicy};
use crate::protocol::{ip_proto, EtherType};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Plain hub: floods everything
    L2Flood,
    /// Dynamic router: security denies, controller traps, ARP-driven forwarding
    CoreRouter,
    /// Router with one precomputed output rule per gateway subnet
    StaticRouter,
    /// Standalone firewall: ARP and ICMP flood, other IPv4 dropped
    Firewall,
}

impl Role {
    /// Rules installed when a switch of this role connects, in order
    pub fn setup_rules(&self, policy: &SecurityPolicy, gateways: &GatewayTable) -> Vec<FlowRule> {
        match self {
            Role::L2Flood => Self::flood_rules(),
            Role::CoreRouter => Self::core_router_rules(policy),
            Role::StaticRouter => Self::static_router_rules(policy, gateways),
            Role::Firewall => Self::firewall_rules(),
        }
    }

    /// Only the dynamic router consults the controller per packet
    pub fn handles_packet_in(&self) -> bool {
        matches!(self, Role::CoreRouter)
    }

    fn flood_rules() -> Vec<FlowRule> {
        vec![FlowRule::new(
            FlowMatch::any(),
            priority::DEFAULT,
            vec![FlowAction::Flood],
        )]
    }

    fn core_router_rules(policy: &SecurityPolicy) -> Vec<FlowRule> {
        let mut rules = policy.flow_rules();
        for eth_type in [EtherType::Arp, EtherType::Ipv4] {
            rules.push(FlowRule::new(
                FlowMatch::eth_type(eth_type),
                priority::CONTROLLER_TRAP,
                vec![FlowAction::SendToController],
            ));
        }
        rules
    }

    fn static_router_rules(policy: &SecurityPolicy, gateways: &GatewayTable) -> Vec<FlowRule> {
        let mut rules = policy.flow_rules();
        rules.extend(gateways.entries().iter().map(|gw| {
            FlowRule::new(
                FlowMatch::ipv4().with_dst(gw.subnet),
                priority::STATIC_ROUTE,
                vec![FlowAction::Output(gw.port)],
            )
        }));
        rules
    }

    fn firewall_rules() -> Vec<FlowRule> {
        vec![
            FlowRule::new(
                FlowMatch::eth_type(EtherType::Arp),
                priority::DEFAULT,
                vec![FlowAction::Flood],
            ),
            FlowRule::new(
                FlowMatch::ipv4().with_ip_proto(ip_proto::ICMP),
                priority::FIREWALL_ALLOW,
                vec![FlowAction::Flood],
            ),
            FlowRule::drop(FlowMatch::ipv4(), priority::CONTROLLER_TRAP),
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::L2Flood => "l2-flood",
            Role::CoreRouter => "core-router",
            Role::StaticRouter => "static-router",
            Role::Firewall => "firewall",
        };
        f.write_str(name)
    }
}

/// Static datapath id to role table
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: HashMap<Dpid, (Role, Option<String>)>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dpid: Dpid, role: Role, name: Option<String>) {
        self.roles.insert(dpid, (role, name));
    }

    /// Unknown ids are a misconfiguration, never a silent default
    pub fn role_of(&self, dpid: Dpid) -> Result<Role> {
        self.roles
            .get(&dpid)
            .map(|(role, _)| *role)
            .ok_or(Error::UnknownSwitch { dpid })
    }

    pub fn name_of(&self, dpid: Dpid) -> Option<&str> {
        self.roles.get(&dpid).and_then(|(_, name)| name.as_deref())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl FromIterator<(Dpid, Role)> for RoleRegistry {
    fn from_iter<I: IntoIterator<Item = (Dpid, Role)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (dpid, role) in iter {
            registry.insert(dpid, role, None);
        }
        registry
    }
}
