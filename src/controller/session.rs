//! Per-switch sessions
//!
//! One session per connected datapath. A router-role session owns its own
//! [`RouterStateMachine`], so the ARP cache is partitioned by switch and
//! starts empty on every (re)connect.

use super::router::Outcome;
use super::{
    Dpid, Effect, FlowRule, GatewayTable, PacketIn, Role, RoleRegistry, RouterStateMachine,
    SecurityPolicy,
};
use crate::protocol::MacAddr;
use crate::telemetry::ControllerMetrics;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Static tables the controller runs from
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub router_mac: MacAddr,
    pub roles: RoleRegistry,
    pub gateways: GatewayTable,
    pub policy: SecurityPolicy,
}

#[derive(Debug)]
struct Session {
    role: Role,
    router: Option<RouterStateMachine>,
}

pub struct Controller {
    router_mac: MacAddr,
    roles: RoleRegistry,
    gateways: Arc<GatewayTable>,
    policy: Arc<SecurityPolicy>,
    sessions: HashMap<Dpid, Session>,
    metrics: Arc<ControllerMetrics>,
}

impl Controller {
    pub fn new(settings: ControllerSettings, metrics: Arc<ControllerMetrics>) -> Self {
        Self {
            router_mac: settings.router_mac,
            roles: settings.roles,
            gateways: Arc::new(settings.gateways),
            policy: Arc::new(settings.policy),
            sessions: HashMap::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<ControllerMetrics> {
        &self.metrics
    }

    /// Rules a switch receives on connect, without connecting it
    pub fn static_rules(&self, dpid: Dpid) -> Result<Vec<FlowRule>> {
        let role = self.roles.role_of(dpid)?;
        Ok(role.setup_rules(&self.policy, &self.gateways))
    }

    /// Classify a newly connected switch and produce its static rules.
    ///
    /// An unknown datapath id aborts setup for that switch; nothing is
    /// installed and later packet-ins from it are ignored.
    pub fn on_connect(&mut self, dpid: Dpid) -> Result<Vec<Effect>> {
        let role = match self.roles.role_of(dpid) {
            Ok(role) => role,
            Err(e) => {
                self.metrics.setup_failures.inc();
                error!(%dpid, "switch setup aborted: {}", e);
                return Err(e);
            }
        };

        let rules = role.setup_rules(&self.policy, &self.gateways);
        let router = role.handles_packet_in().then(|| {
            RouterStateMachine::new(
                self.router_mac,
                Arc::clone(&self.gateways),
                Arc::clone(&self.policy),
            )
        });

        if self.sessions.insert(dpid, Session { role, router }).is_some() {
            debug!(%dpid, "replacing existing session");
        }
        self.metrics.switches_connected.inc();
        self.metrics.rules_installed.add(rules.len() as u64);
        info!(
            %dpid,
            name = self.roles.name_of(dpid).unwrap_or("-"),
            %role,
            rules = rules.len(),
            "switch connected"
        );

        Ok(rules
            .into_iter()
            .map(|rule| Effect::InstallRule { dpid, rule })
            .collect())
    }

    /// Handle a frame no rule matched. Never fails; bad input is dropped.
    pub fn on_packet_in(&mut self, event: &PacketIn<'_>) -> Vec<Effect> {
        self.metrics.packet_ins.inc();

        let Some(session) = self.sessions.get_mut(&event.dpid) else {
            self.metrics.packet_ins_ignored.inc();
            debug!(dpid = %event.dpid, "packet-in from switch without a session");
            return Vec::new();
        };
        let Some(router) = session.router.as_mut() else {
            self.metrics.packet_ins_ignored.inc();
            debug!(dpid = %event.dpid, role = %session.role, "packet-in ignored");
            return Vec::new();
        };

        let before = router.cache().len();
        let decision = router.handle(event);
        let learned = router.cache().len() - before;
        self.metrics.addresses_learned.add(learned as u64);

        let m = &self.metrics;
        match decision.outcome {
            Outcome::Incomplete => m.incomplete_frames.inc(),
            Outcome::Unsupported => m.unsupported_frames.inc(),
            Outcome::Learned => {}
            Outcome::GatewayReply => m.arp_replies_sent.inc(),
            Outcome::Forwarded => {
                m.rules_installed.inc();
                m.frames_forwarded.inc();
            }
            Outcome::ArpRequested => m.arp_requests_sent.inc(),
            Outcome::Unroutable => m.unroutable_drops.inc(),
            Outcome::Denied => m.policy_drops.inc(),
        }

        decision.effects
    }

    /// Forget a switch. Rules already installed stay in its table.
    pub fn on_disconnect(&mut self, dpid: Dpid) -> bool {
        let known = self.sessions.remove(&dpid).is_some();
        if known {
            info!(%dpid, "switch disconnected");
        }
        known
    }

    pub fn arp_cache(&self, dpid: Dpid) -> Option<&super::ArpCache> {
        self.sessions
            .get(&dpid)
            .and_then(|s| s.router.as_ref())
            .map(RouterStateMachine::cache)
    }

    /// ARP caches of connected router switches, ordered by dpid
    pub fn arp_caches(&self) -> Vec<(Dpid, &super::ArpCache)> {
        let mut caches: Vec<_> = self
            .sessions
            .iter()
            .filter_map(|(dpid, s)| s.router.as_ref().map(|r| (*dpid, r.cache())))
            .collect();
        caches.sort_by_key(|(dpid, _)| *dpid);
        caches
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }
}
