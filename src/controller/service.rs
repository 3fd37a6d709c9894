//! Event loop driving the controller
//!
//! Switch events arrive on a channel and are handled strictly one at a
//! time, so the effects of one packet-in reach the dataplane before the
//! next event is looked at.

use super::{Controller, Dataplane, Dpid, PacketIn, PortNo};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Interval at which the loop logs a metrics snapshot
pub const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Something a switch connection reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataplaneEvent {
    Connected { dpid: Dpid },
    PacketIn { dpid: Dpid, in_port: PortNo, frame: Vec<u8> },
    Disconnected { dpid: Dpid },
}

/// Handle one event and push its effects out
pub fn dispatch<D: Dataplane>(
    controller: &mut Controller,
    dataplane: &mut D,
    event: DataplaneEvent,
) {
    match event {
        DataplaneEvent::Connected { dpid } => {
            // Setup failures are already logged and counted
            if let Ok(effects) = controller.on_connect(dpid) {
                dataplane.apply(&effects);
            }
        }
        DataplaneEvent::PacketIn {
            dpid,
            in_port,
            frame,
        } => {
            let effects = controller.on_packet_in(&PacketIn {
                dpid,
                in_port,
                frame: &frame,
            });
            dataplane.apply(&effects);
        }
        DataplaneEvent::Disconnected { dpid } => {
            controller.on_disconnect(dpid);
        }
    }
}

/// Run until every sender is dropped, then hand back the controller and
/// dataplane.
pub async fn run<D: Dataplane>(
    mut controller: Controller,
    mut events: mpsc::Receiver<DataplaneEvent>,
    mut dataplane: D,
) -> (Controller, D) {
    info!("controller started, waiting for switches...");

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    // First tick completes immediately
    report.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                dispatch(&mut controller, &mut dataplane, event);
            }
            _ = report.tick() => {
                debug!(
                    switches = controller.connected(),
                    "{:?}",
                    controller.metrics().snapshot()
                );
            }
        }
    }

    info!("event channel closed, controller stopping");
    (controller, dataplane)
}
