//! Recording dataplane
//!
//! Keeps every call in order and a per-switch flow table, so tests can
//! ask which rule a frame would hit once the switch stops punting it.

use ofroute::controller::{Dataplane, Dpid, FlowRule, PacketKey, PortNo};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Install { dpid: Dpid, rule: FlowRule },
    Emit { dpid: Dpid, port: PortNo, frame: Vec<u8> },
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    tables: HashMap<Dpid, Vec<FlowRule>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget recorded calls; flow tables are kept
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn installs(&self) -> Vec<&FlowRule> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Install { rule, .. } => Some(rule),
                Call::Emit { .. } => None,
            })
            .collect()
    }

    pub fn emits(&self) -> Vec<(PortNo, &[u8])> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Emit { port, frame, .. } => Some((*port, frame.as_slice())),
                Call::Install { .. } => None,
            })
            .collect()
    }

    pub fn table(&self, dpid: Dpid) -> &[FlowRule] {
        self.tables.get(&dpid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest-priority rule in the switch's table matching the frame
    pub fn lookup(&self, dpid: Dpid, frame: &[u8]) -> Option<&FlowRule> {
        let key = PacketKey::from_frame(frame)?;
        self.table(dpid)
            .iter()
            .filter(|rule| rule.matching.matches(&key))
            .max_by_key(|rule| rule.priority)
    }
}

impl Dataplane for Recorder {
    fn install_rule(&mut self, dpid: Dpid, rule: &FlowRule) {
        self.tables.entry(dpid).or_default().push(rule.clone());
        self.calls.push(Call::Install {
            dpid,
            rule: rule.clone(),
        });
    }

    fn emit_frame(&mut self, dpid: Dpid, port: PortNo, frame: &[u8]) {
        self.calls.push(Call::Emit {
            dpid,
            port,
            frame: frame.to_vec(),
        });
    }
}
