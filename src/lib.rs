//! ofroute - SDN controller
//!
//! Controls a small fixed topology of OpenFlow-style switches. Edge and
//! data-center switches flood; the core switch acts as a router whose
//! forwarding rules are installed on demand after ARP resolution.

pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod replay;
pub mod telemetry;

pub use error::{Error, Result};
