//! Router packet-in state machine
//!
//! Every packet-in at a router-role switch runs through [`decide`], a pure
//! function of the current ARP cache and the event. The steps are:
//!
//! 1. learn the sender's IP, MAC and ingress port (ARP or IPv4 only)
//! 2. answer ARP requests for one of our gateway addresses
//! 3. route IPv4: on a cache hit install a forwarding rule and send the
//!    frame on immediately; on a miss ARP for the destination out of the
//!    subnet's gateway port and drop the frame
//!
//! [`RouterStateMachine`] owns the cache and applies the learning step.

use super::flow_rule::{priority, FlowAction, FlowMatch, FlowRule, PacketKey};
use super::{ArpCache, ArpEntry, Effect, GatewayTable, PacketIn, SecurityPolicy};
use crate::protocol::arp::{ArpOp, ArpPacket};
use crate::protocol::ethernet::Frame;
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::{EtherType, Ipv4Cidr, MacAddr};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Read-only inputs to a routing decision
#[derive(Debug, Clone, Copy)]
pub struct RouterContext<'a> {
    pub router_mac: MacAddr,
    pub gateways: &'a GatewayTable,
    pub policy: &'a SecurityPolicy,
}

/// Binding learned from the frame's sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUpdate {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub port: u16,
}

/// How a packet-in was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Truncated or malformed; dropped without learning
    Incomplete,
    /// Neither ARP nor IPv4
    Unsupported,
    /// ARP not addressed to a gateway; only the sender was learned
    Learned,
    /// Answered an ARP request for a gateway address
    GatewayReply,
    /// Forwarding rule installed and frame sent on
    Forwarded,
    /// Destination unknown; ARP request sent, frame dropped
    ArpRequested,
    /// Destination outside every configured subnet
    Unroutable,
    /// Matched a security deny
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub update: Option<CacheUpdate>,
    /// In dataplane order: a rule install always precedes its frame
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

impl Decision {
    fn new(update: Option<CacheUpdate>, outcome: Outcome) -> Self {
        Self {
            update,
            effects: Vec::new(),
            outcome,
        }
    }

    fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }
}

/// Decide what to do with one packet-in.
///
/// Lookups see the binding learned from this very frame, exactly as if
/// the cache had been updated before routing.
pub fn decide(ctx: &RouterContext<'_>, cache: &ArpCache, event: &PacketIn<'_>) -> Decision {
    let frame = match Frame::parse(event.frame) {
        Ok(f) => f,
        Err(e) => {
            warn!(dpid = %event.dpid, port = event.in_port, "ignoring incomplete packet: {}", e);
            return Decision::new(None, Outcome::Incomplete);
        }
    };

    match EtherType::from_u16(frame.ethertype()) {
        Some(EtherType::Arp) => decide_arp(ctx, event, &frame),
        Some(EtherType::Ipv4) => decide_ipv4(ctx, cache, event, &frame),
        None => {
            trace!("unsupported ethertype 0x{:04x}", frame.ethertype());
            Decision::new(None, Outcome::Unsupported)
        }
    }
}

fn decide_arp(ctx: &RouterContext<'_>, event: &PacketIn<'_>, frame: &Frame<'_>) -> Decision {
    let arp = match ArpPacket::parse(frame.payload()) {
        Ok(p) => p,
        Err(e) => {
            warn!(dpid = %event.dpid, port = event.in_port, "ignoring incomplete packet: {}", e);
            return Decision::new(None, Outcome::Incomplete);
        }
    };

    let update = CacheUpdate {
        ip: arp.sender_ip,
        mac: frame.src_mac(),
        port: event.in_port,
    };

    if arp.operation != ArpOp::Request || !ctx.gateways.is_gateway(arp.target_ip) {
        return Decision::new(Some(update), Outcome::Learned);
    }

    let reply = ArpPacket::reply(ctx.router_mac, arp.target_ip, arp.sender_mac, arp.sender_ip);
    debug!(
        "answering ARP for gateway {} to {} on port {}",
        arp.target_ip, arp.sender_ip, event.in_port
    );

    Decision::new(Some(update), Outcome::GatewayReply).with_effects(vec![Effect::EmitFrame {
        dpid: event.dpid,
        port: event.in_port,
        frame: reply.to_frame(),
    }])
}

fn decide_ipv4(
    ctx: &RouterContext<'_>,
    cache: &ArpCache,
    event: &PacketIn<'_>,
    frame: &Frame<'_>,
) -> Decision {
    let ip = match Ipv4Header::parse(frame.payload()) {
        Ok(h) => h,
        Err(e) => {
            warn!(dpid = %event.dpid, port = event.in_port, "ignoring incomplete packet: {}", e);
            return Decision::new(None, Outcome::Incomplete);
        }
    };

    let update = CacheUpdate {
        ip: ip.src_addr(),
        mac: frame.src_mac(),
        port: event.in_port,
    };
    let dst = ip.dst_addr();

    let key = PacketKey::ipv4(ip.src_addr(), dst, ip.protocol());
    if let Some(rule) = ctx.policy.denies(&key) {
        debug!(
            "denied {} -> {} (proto {}) by {}",
            ip.src_addr(),
            dst,
            ip.protocol(),
            rule.name.as_deref().unwrap_or("policy")
        );
        return Decision::new(Some(update), Outcome::Denied);
    }

    let known = if dst == update.ip {
        Some(ArpEntry {
            mac: update.mac,
            port: update.port,
        })
    } else {
        cache.lookup(dst)
    };

    if let Some(entry) = known {
        debug!("routing {} via {} on port {}", dst, entry.mac, entry.port);
        let rule = FlowRule::new(
            FlowMatch::ipv4().with_dst(Ipv4Cidr::host(dst)),
            priority::FORWARD,
            vec![
                FlowAction::SetSrcMac(ctx.router_mac),
                FlowAction::SetDstMac(entry.mac),
                FlowAction::Output(entry.port),
            ],
        );
        let effects = vec![
            Effect::InstallRule {
                dpid: event.dpid,
                rule,
            },
            Effect::EmitFrame {
                dpid: event.dpid,
                port: entry.port,
                frame: frame.with_macs(ctx.router_mac, entry.mac),
            },
        ];
        return Decision::new(Some(update), Outcome::Forwarded).with_effects(effects);
    }

    let Some(gateway) = ctx.gateways.resolve_egress(dst) else {
        trace!("no subnet for {}, dropping", dst);
        return Decision::new(Some(update), Outcome::Unroutable);
    };

    debug!("resolving {} from {} on port {}", dst, gateway.gateway_ip, gateway.port);
    let request = ArpPacket::request(ctx.router_mac, gateway.gateway_ip, dst);
    Decision::new(Some(update), Outcome::ArpRequested).with_effects(vec![Effect::EmitFrame {
        dpid: event.dpid,
        port: gateway.port,
        frame: request.to_frame(),
    }])
}

/// Router state bound to one switch connection
#[derive(Debug)]
pub struct RouterStateMachine {
    router_mac: MacAddr,
    gateways: Arc<GatewayTable>,
    policy: Arc<SecurityPolicy>,
    cache: ArpCache,
}

impl RouterStateMachine {
    pub fn new(
        router_mac: MacAddr,
        gateways: Arc<GatewayTable>,
        policy: Arc<SecurityPolicy>,
    ) -> Self {
        Self {
            router_mac,
            gateways,
            policy,
            cache: ArpCache::new(),
        }
    }

    pub fn context(&self) -> RouterContext<'_> {
        RouterContext {
            router_mac: self.router_mac,
            gateways: &self.gateways,
            policy: &self.policy,
        }
    }

    /// Run one packet-in to completion and commit what it learned
    pub fn handle(&mut self, event: &PacketIn<'_>) -> Decision {
        let decision = decide(&self.context(), &self.cache, event);
        if let Some(update) = decision.update {
            if self.cache.record(update.ip, update.mac, update.port) {
                trace!("learned {} at {} on port {}", update.ip, update.mac, update.port);
            }
        }
        decision
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }
}
