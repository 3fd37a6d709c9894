//! Control plane
//!
//! Classifies connecting switches, installs their static rules and runs
//! the packet-in state machine for router-role switches.

mod arp_cache;
mod effect;
mod flow_rule;
mod gateway;
mod role;
mod router;
mod security;
mod session;
pub mod service;

pub use arp_cache::{ArpCache, ArpEntry};
pub use effect::{Dataplane, Effect, LogDataplane};
pub use flow_rule::{priority, FlowAction, FlowMatch, FlowRule, Ipv4Key, PacketKey};
pub use gateway::{GatewayEntry, GatewayTable};
pub use role::{Role, RoleRegistry};
pub use router::{decide, CacheUpdate, Decision, Outcome, RouterContext, RouterStateMachine};
pub use security::{DenyRule, SecurityPolicy};
pub use session::{Controller, ControllerSettings};
pub use service::DataplaneEvent;

use std::fmt;

/// Switch port number
pub type PortNo = u16;

/// Datapath identifier of a connected switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame the dataplane could not match, handed up to the controller
#[derive(Debug, Clone)]
pub struct PacketIn<'a> {
    pub dpid: Dpid,
    pub in_port: PortNo,
    pub frame: &'a [u8],
}
