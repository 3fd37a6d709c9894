//! Recorded switch event traces
//!
//! A trace is a TOML file of `[[event]]` entries fed through the
//! controller in order, standing in for live switch connections:
//!
//! ```toml
//! [[event]]
//! kind = "connect"
//! dpid = 21
//!
//! [[event]]
//! kind = "packet-in"
//! dpid = 21
//! in_port = 1
//! frame = "ffffffffffff 020000000010 0806 ..."
//! ```

use crate::controller::{DataplaneEvent, Dpid, PortNo};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Trace {
    #[serde(default, rename = "event")]
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TraceEvent {
    Connect { dpid: u64 },
    PacketIn { dpid: u64, in_port: PortNo, frame: String },
    Disconnect { dpid: u64 },
}

impl TraceEvent {
    pub fn to_event(&self) -> Result<DataplaneEvent> {
        Ok(match self {
            TraceEvent::Connect { dpid } => DataplaneEvent::Connected { dpid: Dpid(*dpid) },
            TraceEvent::PacketIn {
                dpid,
                in_port,
                frame,
            } => DataplaneEvent::PacketIn {
                dpid: Dpid(*dpid),
                in_port: *in_port,
                frame: decode_hex(frame)?,
            },
            TraceEvent::Disconnect { dpid } => DataplaneEvent::Disconnected { dpid: Dpid(*dpid) },
        })
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<DataplaneEvent>> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Vec<DataplaneEvent>> {
    let trace: Trace = toml::from_str(content).map_err(|e| Error::Parse(e.to_string()))?;
    trace
        .events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            event.to_event().map_err(|e| match e {
                Error::InvalidPacket(msg) => Error::InvalidPacket(format!("event[{}]: {}", i, msg)),
                other => other,
            })
        })
        .collect()
}

/// Decode a hex frame dump. Whitespace and ':' separators are ignored.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|e| Error::InvalidPacket(format!("bad frame hex: {}", e)))
}
