//! Side effects of controller decisions and the dataplane they go to

use super::{Dpid, FlowRule, PortNo};
use tracing::info;

/// Something the controller asks a switch to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    InstallRule { dpid: Dpid, rule: FlowRule },
    EmitFrame { dpid: Dpid, port: PortNo, frame: Vec<u8> },
}

/// Outbound half of the switch connection.
///
/// Calls are fire-and-forget: there is no acknowledgment, retry or
/// timeout at this layer.
pub trait Dataplane {
    fn install_rule(&mut self, dpid: Dpid, rule: &FlowRule);

    fn emit_frame(&mut self, dpid: Dpid, port: PortNo, frame: &[u8]);

    /// Deliver effects in the order they were produced
    fn apply(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::InstallRule { dpid, rule } => self.install_rule(*dpid, rule),
                Effect::EmitFrame { dpid, port, frame } => self.emit_frame(*dpid, *port, frame),
            }
        }
    }
}

/// Dataplane that only logs what it is asked to do
#[derive(Debug, Default)]
pub struct LogDataplane {
    pub rules_installed: usize,
    pub frames_emitted: usize,
}

impl Dataplane for LogDataplane {
    fn install_rule(&mut self, dpid: Dpid, rule: &FlowRule) {
        self.rules_installed += 1;
        info!(%dpid, "flow_mod {}", rule);
    }

    fn emit_frame(&mut self, dpid: Dpid, port: PortNo, frame: &[u8]) {
        self.frames_emitted += 1;
        info!(%dpid, port, len = frame.len(), "packet_out");
    }
}
