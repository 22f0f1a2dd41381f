//! Demo topology: a point-to-point sender and a small LAN, all sending
//! to one sink.
//!
//! ```text
//!        10.1.1.0
//!  n0 -------------- n1   n2   n3   n4
//!     point-to-point  |    |    |    |
//!                     ==================
//!                        LAN 10.1.2.0
//! ```
//!
//! The last LAN node hosts the sink on [`ScenarioConfig::sink_port`];
//! every other node runs a periodic sender toward it, starting at
//! staggered times.

use crate::config::ScenarioConfig;
use flowsim_simulation::{PeriodicSenderConfig, Simulation, SimulationError};
use std::net::Ipv4Addr;
use tracing::info;

/// Build the demo topology inside `sim` and schedule every start/stop.
///
/// After this returns, the simulation is ready for
/// `run_until(config.stop_time)`.
pub fn build_scenario(
    config: &ScenarioConfig,
    sim: &mut Simulation,
) -> Result<(), SimulationError> {
    // A sink is needed even for an empty LAN; and a /24 of senders is
    // plenty for a demo.
    let lan = config.lan_nodes.clamp(1, 250);

    let p2p = sim.add_node(Ipv4Addr::new(10, 1, 1, 1))?;

    let mut lan_ids = Vec::new();
    for i in 0..=lan {
        lan_ids.push(sim.add_node(Ipv4Addr::new(10, 1, 2, (i + 1) as u8))?);
    }
    let sink_node = *lan_ids.last().unwrap();
    let sink_addr = Ipv4Addr::new(10, 1, 2, (lan + 1) as u8);

    let sink = sim.install_receiver(sink_node, config.sink_port);
    sim.start_app(sink, config.start_time)?;
    sim.stop_app(sink, config.stop_time)?;

    let sender_config = PeriodicSenderConfig {
        destination: sink_addr,
        port: config.sink_port,
        packet_size: config.packet_size,
        interval: config.interval,
        max_packets: config.max_packets,
    };

    // The point-to-point node first, then the LAN nodes in address
    // order, each one stagger-step behind the previous one.
    let sender_nodes = std::iter::once(p2p).chain(lan_ids[..lan as usize].iter().copied());
    for (i, node) in sender_nodes.enumerate() {
        let app = sim.install_sender(node, sender_config.clone())?;
        let start = config.start_time + config.start_stagger * i as u32;
        sim.start_app(app, start)?;
        sim.stop_app(app, config.stop_time)?;
    }

    info!(
        senders = lan + 1,
        sink = %sink_addr,
        port = config.sink_port,
        "Scenario built"
    );
    Ok(())
}
