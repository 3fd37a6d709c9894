//! Wire formats the controller interprets
//!
//! Only Ethernet frames carrying ARP or IPv4 are understood; everything
//! else is passed over after the ethertype check.

pub mod arp;
pub mod cidr;
pub mod ethernet;
pub mod ipv4;
pub mod types;

pub use cidr::Ipv4Cidr;
pub use types::*;
