//! Configuration types for the scenario runner.

use flowsim_simulation::NetworkConfig;
use flowsim_types::VirtualTime;

/// Configuration for a scenario run.
///
/// Describes the demo topology: one point-to-point sender plus a small
/// LAN of senders, all aimed at a single sink, with staggered start
/// times.
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    /// Number of LAN nodes beside the point-to-point sender. The last
    /// LAN node hosts the sink; the rest run senders.
    pub lan_nodes: u32,

    /// Port the sink listens on.
    pub sink_port: u16,

    /// Interval between packets from each sender.
    pub interval: VirtualTime,

    /// Payload size of each packet, in bytes.
    pub packet_size: u32,

    /// Packets each sender emits.
    pub max_packets: u32,

    /// When the first sender starts.
    pub start_time: VirtualTime,

    /// Gap between consecutive sender starts.
    pub start_stagger: VirtualTime,

    /// When every application stops and the run ends.
    pub stop_time: VirtualTime,

    /// Base one-way latency of the substrate.
    pub latency: VirtualTime,

    /// Latency jitter as a fraction of the base latency.
    pub jitter_fraction: f64,

    /// Packet loss rate (0.0 - 1.0).
    pub loss_rate: f64,

    /// Random seed for deterministic runs.
    pub seed: u64,
}

impl ScenarioConfig {
    /// Create a scenario configuration for a LAN of the given size.
    pub fn new(lan_nodes: u32) -> Self {
        Self {
            lan_nodes,
            sink_port: 9,
            interval: VirtualTime::from_secs_f64(0.2),
            packet_size: 2048,
            max_packets: 3,
            start_time: VirtualTime::from_secs(1),
            start_stagger: VirtualTime::from_millis(500),
            stop_time: VirtualTime::from_secs(15),
            latency: VirtualTime::from_millis(2),
            jitter_fraction: 0.0,
            loss_rate: 0.0,
            seed: 12345,
        }
    }

    /// Set the interval between packets.
    pub fn with_interval(mut self, interval: VirtualTime) -> Self {
        self.interval = interval;
        self
    }

    /// Set the packet payload size.
    pub fn with_packet_size(mut self, packet_size: u32) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Set the number of packets each sender emits.
    pub fn with_max_packets(mut self, max_packets: u32) -> Self {
        self.max_packets = max_packets;
        self
    }

    /// Set the stop time.
    pub fn with_stop_time(mut self, stop_time: VirtualTime) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// Set the substrate base latency.
    pub fn with_latency(mut self, latency: VirtualTime) -> Self {
        self.latency = latency;
        self
    }

    /// Set the latency jitter fraction.
    pub fn with_jitter_fraction(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction.clamp(0.0, 1.0);
        self
    }

    /// Set the packet loss rate.
    pub fn with_loss_rate(mut self, loss_rate: f64) -> Self {
        self.loss_rate = loss_rate.clamp(0.0, 1.0);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of sender applications the scenario installs: the
    /// point-to-point node plus every LAN node except the sink.
    pub fn total_senders(&self) -> u32 {
        self.lan_nodes.max(1) + 1
    }

    /// Convert to a NetworkConfig for the underlying substrate.
    pub fn to_network_config(&self) -> NetworkConfig {
        NetworkConfig {
            latency: self.latency,
            jitter_fraction: self.jitter_fraction,
            loss_rate: self.loss_rate,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
