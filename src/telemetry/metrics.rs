//! Counters for controller activity.
//!
//! Shared between the controller and whoever reports on it via `Arc`;
//! updates use relaxed atomics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Controller-wide counters.
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    pub switches_connected: Counter,
    pub setup_failures: Counter,
    pub packet_ins: Counter,
    /// Packet-ins from switches that are not routers or not connected
    pub packet_ins_ignored: Counter,
    pub incomplete_frames: Counter,
    pub unsupported_frames: Counter,
    pub addresses_learned: Counter,
    pub arp_replies_sent: Counter,
    pub arp_requests_sent: Counter,
    pub rules_installed: Counter,
    pub frames_forwarded: Counter,
    pub unroutable_drops: Counter,
    pub policy_drops: Counter,
}

/// Point-in-time copy of [`ControllerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub switches_connected: u64,
    pub setup_failures: u64,
    pub packet_ins: u64,
    pub packet_ins_ignored: u64,
    pub incomplete_frames: u64,
    pub unsupported_frames: u64,
    pub addresses_learned: u64,
    pub arp_replies_sent: u64,
    pub arp_requests_sent: u64,
    pub rules_installed: u64,
    pub frames_forwarded: u64,
    pub unroutable_drops: u64,
    pub policy_drops: u64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            switches_connected: self.switches_connected.get(),
            setup_failures: self.setup_failures.get(),
            packet_ins: self.packet_ins.get(),
            packet_ins_ignored: self.packet_ins_ignored.get(),
            incomplete_frames: self.incomplete_frames.get(),
            unsupported_frames: self.unsupported_frames.get(),
            addresses_learned: self.addresses_learned.get(),
            arp_replies_sent: self.arp_replies_sent.get(),
            arp_requests_sent: self.arp_requests_sent.get(),
            rules_installed: self.rules_installed.get(),
            frames_forwarded: self.frames_forwarded.get(),
            unroutable_drops: self.unroutable_drops.get(),
            policy_drops: self.policy_drops.get(),
        }
    }
}
