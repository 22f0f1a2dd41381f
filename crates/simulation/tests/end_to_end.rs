//! End-to-end flow measurement scenarios.

use flowsim_simulation::{NetworkConfig, PeriodicSenderConfig, Simulation};
use flowsim_types::VirtualTime;
use std::net::Ipv4Addr;
use tracing_test::traced_test;

const SINK_ADDR: Ipv4Addr = Ipv4Addr::new(10, 1, 2, 4);

/// A quiet substrate: fixed 2ms latency, no jitter, no loss.
fn quiet_network() -> NetworkConfig {
    NetworkConfig {
        latency: VirtualTime::from_millis(2),
        jitter_fraction: 0.0,
        loss_rate: 0.0,
    }
}

fn echo_sender_config() -> PeriodicSenderConfig {
    PeriodicSenderConfig {
        destination: SINK_ADDR,
        port: 9,
        packet_size: 2048,
        interval: VirtualTime::from_secs_f64(0.2),
        max_packets: 3,
    }
}

#[test]
#[traced_test]
fn test_three_packet_burst_timing() {
    // One sender: interval 0.2s, 3 packets of 2048 bytes, starting at
    // 1.0s, stopping well after the burst. Sends land at exactly 1.0,
    // 1.2, and 1.4; with a constant 2ms latency the receives land at
    // 1.002, 1.202, and 1.402.
    let mut sim = Simulation::new(quiet_network(), 42);
    let src = sim.add_node(Ipv4Addr::new(10, 1, 1, 1)).unwrap();
    let dst = sim.add_node(SINK_ADDR).unwrap();

    let sink = sim.install_receiver(dst, 9);
    let sender = sim.install_sender(src, echo_sender_config()).unwrap();

    sim.start_app(sink, VirtualTime::from_secs(1)).unwrap();
    sim.start_app(sender, VirtualTime::from_secs(1)).unwrap();
    sim.stop_app(sink, VirtualTime::from_secs(15)).unwrap();
    sim.stop_app(sender, VirtualTime::from_secs(15)).unwrap();

    sim.run_until(VirtualTime::from_secs(15));

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.len(), 1);

    let stats = snapshot.values().next().unwrap();
    assert_eq!(stats.tx_packets, 3);
    assert_eq!(stats.rx_packets, 3);
    assert_eq!(stats.tx_bytes, 3 * 2048);
    assert_eq!(stats.rx_bytes, 3 * 2048);
    assert_eq!(stats.first_tx_time, Some(VirtualTime::from_secs(1)));
    assert_eq!(
        stats.last_rx_time,
        Some(VirtualTime::from_secs_f64(1.402)),
        "Last send at 1.4s plus 2ms latency"
    );
    assert_eq!(stats.delay_sum, VirtualTime::from_millis(6));
    assert_eq!(
        stats.metrics().avg_delay,
        Some(VirtualTime::from_millis(2))
    );

    // 6144 bytes over the 402ms between first send and last receive.
    let expected = 6144.0 * 8.0 / 0.402 / 1024.0 / 1024.0;
    assert!((stats.metrics().throughput_mbps.unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_same_destination_different_source_ports_are_two_flows() {
    // Two senders on the same node, aimed at the same sink and port.
    // Their ephemeral source ports differ, so the monitor must keep two
    // separate entries.
    let mut sim = Simulation::new(quiet_network(), 42);
    let src = sim.add_node(Ipv4Addr::new(10, 1, 1, 1)).unwrap();
    let dst = sim.add_node(SINK_ADDR).unwrap();

    let sink = sim.install_receiver(dst, 9);
    let sender_a = sim.install_sender(src, echo_sender_config()).unwrap();
    let sender_b = sim.install_sender(src, echo_sender_config()).unwrap();

    sim.start_app(sink, VirtualTime::ZERO).unwrap();
    sim.start_app(sender_a, VirtualTime::from_secs(1)).unwrap();
    sim.start_app(sender_b, VirtualTime::from_secs(1)).unwrap();

    sim.run_until(VirtualTime::from_secs(15));

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.len(), 2, "One FlowStats entry per source port");

    let ports: Vec<u16> = snapshot.keys().map(|key| key.source_port).collect();
    assert_ne!(ports[0], ports[1]);
    for stats in snapshot.values() {
        assert_eq!(stats.tx_packets, 3);
        assert_eq!(stats.rx_packets, 3);
    }
}

#[test]
fn test_staggered_senders_share_the_sink() {
    // Several nodes each run a sender toward the same sink, starting at
    // staggered times; every flow is measured independently.
    let mut sim = Simulation::new(quiet_network(), 42);
    let dst = sim.add_node(SINK_ADDR).unwrap();
    let sink = sim.install_receiver(dst, 9);
    sim.start_app(sink, VirtualTime::ZERO).unwrap();

    for i in 0..3u8 {
        let node = sim.add_node(Ipv4Addr::new(10, 1, 1, i + 1)).unwrap();
        let sender = sim.install_sender(node, echo_sender_config()).unwrap();
        let start = VirtualTime::from_secs(1) + VirtualTime::from_millis(500) * u32::from(i);
        sim.start_app(sender, start).unwrap();
    }

    sim.run_until(VirtualTime::from_secs(15));

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.len(), 3);
    for (key, stats) in &snapshot {
        assert_eq!(stats.tx_packets, 3, "flow {key} should have sent 3 packets");
        assert_eq!(stats.rx_packets, 3, "flow {key} should have received 3 packets");
        assert_eq!(stats.metrics().avg_delay, Some(VirtualTime::from_millis(2)));
    }

    // Staggered starts show up in the per-flow first-send times.
    let first_sends: Vec<_> = snapshot.values().map(|s| s.first_tx_time).collect();
    assert_eq!(
        first_sends,
        vec![
            Some(VirtualTime::from_secs_f64(1.0)),
            Some(VirtualTime::from_secs_f64(1.5)),
            Some(VirtualTime::from_secs_f64(2.0)),
        ]
    );
}

#[test]
fn test_mid_run_snapshot_is_valid_but_not_final() {
    // The monitor can be read at any time; a snapshot taken while
    // traffic is still scheduled simply reflects what has been observed
    // so far.
    let mut sim = Simulation::new(quiet_network(), 42);
    let src = sim.add_node(Ipv4Addr::new(10, 1, 1, 1)).unwrap();
    let dst = sim.add_node(SINK_ADDR).unwrap();
    let sink = sim.install_receiver(dst, 9);
    let sender = sim.install_sender(src, echo_sender_config()).unwrap();
    sim.start_app(sink, VirtualTime::ZERO).unwrap();
    sim.start_app(sender, VirtualTime::from_secs(1)).unwrap();

    let before = sim.snapshot();
    assert!(before.is_empty(), "Nothing observed before the run");

    sim.run_until(VirtualTime::from_secs(15));

    let after = sim.snapshot();
    assert_eq!(after.len(), 1);
    assert_eq!(after, sim.snapshot(), "Repeated snapshots are identical");
}
