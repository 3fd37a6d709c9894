//! Controller tests against the reference topology
//!
//! Run with: cargo test --test controller

mod recorder;

use ofroute::config;
use ofroute::controller::service::{self, DataplaneEvent};
use ofroute::controller::{
    priority, Controller, Dataplane, Dpid, FlowAction, FlowMatch, PacketIn, PortNo,
};
use ofroute::protocol::arp::{ArpOp, ArpPacket};
use ofroute::protocol::ethernet::{Frame, FrameBuilder};
use ofroute::protocol::ipv4::{self, Ipv4Header};
use ofroute::protocol::{ip_proto, EtherType, Ipv4Cidr, MacAddr};
use ofroute::telemetry::ControllerMetrics;
use ofroute::Error;
use recorder::{Call, Recorder};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;

const CORE: Dpid = Dpid(21);
const ROUTER_MAC: MacAddr = MacAddr([0, 0, 0, 0, 0, 1]);
const H1_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0x01, 0x0a]);
const MAC_X: MacAddr = MacAddr([0x02, 0, 0, 0, 0x02, 0x14]);
const SERV1_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 0x04, 0x0a]);
const UNTRUSTED_MAC: MacAddr = MacAddr([0x02, 0, 0, 0x10, 0x10, 0x64]);

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Controller wired to a recording dataplane
struct Harness {
    controller: Controller,
    dataplane: Recorder,
}

impl Harness {
    fn reference() -> Self {
        let settings = config::reference().unwrap().resolve().unwrap();
        Self {
            controller: Controller::new(settings, Arc::new(ControllerMetrics::new())),
            dataplane: Recorder::new(),
        }
    }

    fn connect(&mut self, dpid: Dpid) -> ofroute::Result<()> {
        let effects = self.controller.on_connect(dpid)?;
        self.dataplane.apply(&effects);
        Ok(())
    }

    /// Core router connected, setup calls cleared
    fn with_core() -> Self {
        let mut harness = Self::reference();
        harness.connect(CORE).unwrap();
        harness.dataplane.clear_calls();
        harness
    }

    fn packet_in(&mut self, in_port: PortNo, frame: &[u8]) {
        let effects = self.controller.on_packet_in(&PacketIn {
            dpid: CORE,
            in_port,
            frame,
        });
        self.dataplane.apply(&effects);
    }
}

fn ipv4_frame(src_mac: MacAddr, src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Vec<u8> {
    let packet = ipv4::build_packet(src, dst, protocol, b"payload");
    FrameBuilder::new(EtherType::Ipv4)
        .src_mac(src_mac)
        .dst_mac(ROUTER_MAC)
        .payload(&packet)
        .build()
}

fn arp_reply_to_router(mac: MacAddr, addr: Ipv4Addr, gateway: Ipv4Addr) -> Vec<u8> {
    ArpPacket::reply(mac, addr, ROUTER_MAC, gateway).to_frame()
}

#[test]
fn test_flood_switches_get_one_wildcard_rule() {
    let mut harness = Harness::reference();
    for dpid in [Dpid(1), Dpid(2), Dpid(3), Dpid(31)] {
        harness.connect(dpid).unwrap();
        let table = harness.dataplane.table(dpid);
        assert_eq!(table.len(), 1, "dpid {}", dpid);
        assert!(table[0].matching.is_wildcard());
        assert_eq!(table[0].actions, vec![FlowAction::Flood]);
    }

    let frames = [
        ArpPacket::request(H1_MAC, ip("10.0.1.10"), ip("10.0.1.1")).to_frame(),
        ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("10.0.1.11"), ip_proto::TCP),
        FrameBuilder::new(EtherType::Ipv4).payload(&[0; 4]).build(),
    ];
    for frame in &frames {
        let rule = harness.dataplane.lookup(Dpid(1), frame).unwrap();
        assert_eq!(rule.actions, vec![FlowAction::Flood]);
    }
}

#[test]
fn test_core_router_setup_order() {
    let mut harness = Harness::reference();
    harness.connect(CORE).unwrap();

    let priorities: Vec<u16> = harness
        .dataplane
        .installs()
        .iter()
        .map(|r| r.priority)
        .collect();
    assert_eq!(
        priorities,
        vec![
            priority::SECURITY_DENY,
            priority::SECURITY_DENY,
            priority::CONTROLLER_TRAP,
            priority::CONTROLLER_TRAP,
        ]
    );

    let installs = harness.dataplane.installs();
    assert!(installs[0].is_drop());
    assert!(installs[1].is_drop());
    assert_eq!(installs[2].matching, FlowMatch::eth_type(EtherType::Arp));
    assert_eq!(installs[3].matching, FlowMatch::eth_type(EtherType::Ipv4));
    assert_eq!(installs[3].actions, vec![FlowAction::SendToController]);
}

#[test]
fn test_unknown_switch_aborts_setup() {
    let mut harness = Harness::reference();
    let err = harness.connect(Dpid(42)).unwrap_err();
    assert!(matches!(err, Error::UnknownSwitch { dpid: Dpid(42) }));
    assert!(harness.dataplane.calls.is_empty());

    let snapshot = harness.controller.metrics().snapshot();
    assert_eq!(snapshot.setup_failures, 1);
    assert_eq!(snapshot.switches_connected, 0);
}

#[test]
fn test_gateway_arp_reply() {
    let mut harness = Harness::with_core();
    let request = ArpPacket::request(H1_MAC, ip("10.0.1.10"), ip("10.0.1.1")).to_frame();
    harness.packet_in(1, &request);

    assert!(harness.dataplane.installs().is_empty());
    let emits = harness.dataplane.emits();
    assert_eq!(emits.len(), 1);
    let (port, bytes) = emits[0];
    assert_eq!(port, 1);

    let frame = Frame::parse(bytes).unwrap();
    assert_eq!(frame.src_mac(), ROUTER_MAC);
    assert_eq!(frame.dst_mac(), H1_MAC);
    let reply = ArpPacket::parse(frame.payload()).unwrap();
    assert_eq!(reply.operation, ArpOp::Reply);
    assert_eq!(reply.sender_mac, ROUTER_MAC);
    assert_eq!(reply.sender_ip, ip("10.0.1.1"));
    assert_eq!(reply.target_mac, H1_MAC);
    assert_eq!(reply.target_ip, ip("10.0.1.10"));
}

#[test]
fn test_arp_for_other_host_only_learns() {
    let mut harness = Harness::with_core();
    let request = ArpPacket::request(H1_MAC, ip("10.0.1.10"), ip("10.0.1.11")).to_frame();
    harness.packet_in(1, &request);

    assert!(harness.dataplane.calls.is_empty());
    let entry = harness
        .controller
        .arp_cache(CORE)
        .unwrap()
        .lookup(ip("10.0.1.10"))
        .unwrap();
    assert_eq!(entry.mac, H1_MAC);
    assert_eq!(entry.port, 1);
}

#[test]
fn test_learning_is_idempotent() {
    let mut harness = Harness::with_core();
    let reply = arp_reply_to_router(MAC_X, ip("10.0.2.20"), ip("10.0.2.1"));
    harness.packet_in(2, &reply);
    let once: Vec<_> = harness
        .controller
        .arp_cache(CORE)
        .unwrap()
        .iter()
        .map(|(ip, entry)| (*ip, *entry))
        .collect();

    harness.packet_in(2, &reply);
    let cache = harness.controller.arp_cache(CORE).unwrap();
    let twice: Vec<_> = cache.iter().map(|(ip, entry)| (*ip, *entry)).collect();
    assert_eq!(once, twice);
    assert_eq!(cache.len(), 1);
    assert_eq!(harness.controller.metrics().snapshot().addresses_learned, 1);
}

#[test]
fn test_cache_miss_then_hit() {
    let mut harness = Harness::with_core();
    let original = ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("10.0.2.20"), ip_proto::ICMP);

    // No entry for 10.0.2.20 yet: resolve it out of the 10.0.2.0/24 port
    harness.packet_in(1, &original);
    assert!(harness.dataplane.installs().is_empty());
    let emits = harness.dataplane.emits();
    assert_eq!(emits.len(), 1);
    let (port, bytes) = emits[0];
    assert_eq!(port, 2);
    let frame = Frame::parse(bytes).unwrap();
    assert!(frame.dst_mac().is_broadcast());
    let request = ArpPacket::parse(frame.payload()).unwrap();
    assert_eq!(request.operation, ArpOp::Request);
    assert_eq!(request.sender_ip, ip("10.0.2.1"));
    assert_eq!(request.sender_mac, ROUTER_MAC);
    assert_eq!(request.target_ip, ip("10.0.2.20"));

    harness.packet_in(2, &arp_reply_to_router(MAC_X, ip("10.0.2.20"), ip("10.0.2.1")));
    harness.dataplane.clear_calls();

    harness.packet_in(1, &original);
    assert_eq!(harness.dataplane.calls.len(), 2);
    let Call::Install { dpid, rule } = &harness.dataplane.calls[0] else {
        panic!("expected the rule install first");
    };
    assert_eq!(*dpid, CORE);
    assert_eq!(rule.priority, priority::FORWARD);
    assert_eq!(
        rule.matching,
        FlowMatch::ipv4().with_dst(Ipv4Cidr::host(ip("10.0.2.20")))
    );
    assert_eq!(
        rule.actions,
        vec![
            FlowAction::SetSrcMac(ROUTER_MAC),
            FlowAction::SetDstMac(MAC_X),
            FlowAction::Output(2),
        ]
    );

    let Call::Emit { port, frame, .. } = &harness.dataplane.calls[1] else {
        panic!("expected the frame after the install");
    };
    assert_eq!(*port, 2);
    let forwarded = Frame::parse(frame).unwrap();
    assert_eq!(forwarded.src_mac(), ROUTER_MAC);
    assert_eq!(forwarded.dst_mac(), MAC_X);
    assert_eq!(forwarded.payload(), &original[14..]);

    // The switch now forwards 10.0.2.20 itself
    let hit = harness.dataplane.lookup(CORE, &original).unwrap();
    assert_eq!(hit.priority, priority::FORWARD);
}

#[test]
fn test_unroutable_destination_dropped() {
    let mut harness = Harness::with_core();
    harness.packet_in(1, &ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("8.8.8.8"), ip_proto::UDP));
    assert!(harness.dataplane.calls.is_empty());
    assert_eq!(harness.controller.metrics().snapshot().unroutable_drops, 1);
}

#[test]
fn test_untrusted_host_never_reaches_server() {
    let mut harness = Harness::with_core();
    let serv1 = ip("10.0.4.10");
    let untrusted = ip("172.16.10.100");

    // A trusted host gets a forwarding rule toward the server
    harness.packet_in(4, &arp_reply_to_router(SERV1_MAC, serv1, ip("10.0.4.1")));
    let trusted = ipv4_frame(H1_MAC, ip("10.0.1.10"), serv1, ip_proto::TCP);
    harness.packet_in(1, &trusted);
    assert_eq!(harness.dataplane.installs().len(), 1);
    harness.dataplane.clear_calls();

    // The untrusted host's own packet-ins are refused outright
    let attack = ipv4_frame(UNTRUSTED_MAC, untrusted, serv1, ip_proto::TCP);
    harness.packet_in(5, &attack);
    assert!(harness.dataplane.calls.is_empty());

    let ping = ipv4_frame(UNTRUSTED_MAC, untrusted, ip("10.0.1.10"), ip_proto::ICMP);
    harness.packet_in(5, &ping);
    assert!(harness.dataplane.calls.is_empty());
    assert_eq!(harness.controller.metrics().snapshot().policy_drops, 2);

    // In the switch table the deny beats the forwarding rule
    let rule = harness.dataplane.lookup(CORE, &attack).unwrap();
    assert!(rule.is_drop());
    assert_eq!(rule.priority, priority::SECURITY_DENY);
    let rule = harness.dataplane.lookup(CORE, &ping).unwrap();
    assert!(rule.is_drop());

    // Other traffic from the untrusted host is still routed
    let udp = ipv4_frame(UNTRUSTED_MAC, untrusted, ip("10.0.1.10"), ip_proto::UDP);
    harness.packet_in(5, &udp);
    assert_eq!(harness.dataplane.emits().len(), 1);
    assert_eq!(harness.dataplane.emits()[0].0, 1);
    assert!(harness
        .dataplane
        .emits()
        .iter()
        .all(|(port, _)| *port != 4));
}

#[test]
fn test_packet_to_gateway_takes_cache_miss_path() {
    let mut harness = Harness::with_core();
    let frame = ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("10.0.1.1"), ip_proto::ICMP);
    harness.packet_in(1, &frame);

    assert!(harness.dataplane.installs().is_empty());
    let emits = harness.dataplane.emits();
    assert_eq!(emits.len(), 1);
    let (port, bytes) = emits[0];
    assert_eq!(port, 1);
    let request = ArpPacket::parse(Frame::parse(bytes).unwrap().payload()).unwrap();
    assert_eq!(request.operation, ArpOp::Request);
    assert_eq!(request.sender_ip, ip("10.0.1.1"));
    assert_eq!(request.target_ip, ip("10.0.1.1"));
    assert_eq!(harness.controller.metrics().snapshot().arp_requests_sent, 1);
}

#[test]
fn test_bad_frames_do_not_disturb_controller() {
    let mut harness = Harness::with_core();
    harness.packet_in(1, &[0xff; 10]);
    let truncated = FrameBuilder::new(EtherType::Arp).payload(&[0; 8]).build();
    harness.packet_in(1, &truncated);
    let ipv6 = [vec![0xff; 12], vec![0x86, 0xdd], vec![0x60; 40]].concat();
    harness.packet_in(1, &ipv6);

    assert!(harness.dataplane.calls.is_empty());
    assert!(harness.controller.arp_cache(CORE).unwrap().is_empty());
    let snapshot = harness.controller.metrics().snapshot();
    assert_eq!(snapshot.incomplete_frames, 2);
    assert_eq!(snapshot.unsupported_frames, 1);

    // Still routing afterwards
    let request = ArpPacket::request(H1_MAC, ip("10.0.1.10"), ip("10.0.1.1")).to_frame();
    harness.packet_in(1, &request);
    assert_eq!(harness.dataplane.emits().len(), 1);
}

#[test]
fn test_flood_switch_ignores_packet_in() {
    let mut harness = Harness::reference();
    harness.connect(Dpid(1)).unwrap();
    harness.dataplane.clear_calls();

    let request = ArpPacket::request(H1_MAC, ip("10.0.1.10"), ip("10.0.1.1")).to_frame();
    let effects = harness.controller.on_packet_in(&PacketIn {
        dpid: Dpid(1),
        in_port: 1,
        frame: &request,
    });
    assert!(effects.is_empty());
    assert_eq!(harness.controller.metrics().snapshot().packet_ins_ignored, 1);
}

#[tokio::test]
async fn test_service_scenario() {
    let settings = config::reference().unwrap().resolve().unwrap();
    let controller = Controller::new(settings, Arc::new(ControllerMetrics::new()));
    let original = ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("10.0.2.20"), ip_proto::ICMP);

    let (tx, rx) = mpsc::channel(16);
    let events = vec![
        DataplaneEvent::Connected { dpid: Dpid(2) },
        DataplaneEvent::Connected { dpid: CORE },
        DataplaneEvent::PacketIn {
            dpid: CORE,
            in_port: 1,
            frame: original.clone(),
        },
        DataplaneEvent::PacketIn {
            dpid: CORE,
            in_port: 2,
            frame: arp_reply_to_router(MAC_X, ip("10.0.2.20"), ip("10.0.2.1")),
        },
        DataplaneEvent::PacketIn {
            dpid: CORE,
            in_port: 1,
            frame: original,
        },
    ];
    for event in events {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    let (controller, dataplane) = service::run(controller, rx, Recorder::new()).await;

    // 1 flood + 2 denies + 2 traps + 1 forward
    assert_eq!(dataplane.installs().len(), 6);
    assert_eq!(dataplane.table(CORE).len(), 5);
    let ports: Vec<PortNo> = dataplane.emits().iter().map(|(p, _)| *p).collect();
    assert_eq!(ports, vec![2, 2]);

    let snapshot = controller.metrics().snapshot();
    assert_eq!(snapshot.arp_requests_sent, 1);
    assert_eq!(snapshot.frames_forwarded, 1);
    assert_eq!(snapshot.addresses_learned, 2);
}

#[test]
fn test_forwarded_frame_keeps_ip_header() {
    let mut harness = Harness::with_core();
    harness.packet_in(2, &arp_reply_to_router(MAC_X, ip("10.0.2.20"), ip("10.0.2.1")));
    harness.dataplane.clear_calls();

    harness.packet_in(1, &ipv4_frame(H1_MAC, ip("10.0.1.10"), ip("10.0.2.20"), ip_proto::UDP));
    let (_, bytes) = harness.dataplane.emits()[0];
    let frame = Frame::parse(bytes).unwrap();
    let header = Ipv4Header::parse(frame.payload()).unwrap();
    assert_eq!(header.src_addr(), ip("10.0.1.10"));
    assert_eq!(header.dst_addr(), ip("10.0.2.20"));
    assert_eq!(header.protocol(), ip_proto::UDP);
}

#[tokio::test]
async fn test_demo_trace() {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/trace.toml");
    let events = ofroute::replay::load(path).unwrap();
    assert_eq!(events.len(), 7);

    let settings = config::load(
        std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("controller.toml"),
    )
    .unwrap()
    .resolve()
    .unwrap();
    let controller = Controller::new(settings, Arc::new(ControllerMetrics::new()));

    let (tx, rx) = mpsc::channel(4);
    let feeder = tokio::spawn(async move {
        for event in events {
            tx.send(event).await.unwrap();
        }
    });
    let (controller, dataplane) = service::run(controller, rx, Recorder::new()).await;
    feeder.await.unwrap();

    let ports: Vec<PortNo> = dataplane.emits().iter().map(|(p, _)| *p).collect();
    assert_eq!(ports, vec![1, 2, 2]);
    assert_eq!(dataplane.installs().last().unwrap().priority, priority::FORWARD);
    assert_eq!(controller.connected(), 1);
    assert!(controller.arp_cache(CORE).is_none());
}
