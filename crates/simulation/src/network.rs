//! Simulated delivery substrate with deterministic latency, jitter, and
//! packet loss.

use flowsim_types::{NodeId, Packet, VirtualTime};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::trace;

/// Configuration for the simulated delivery substrate.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Base one-way latency for every hop.
    pub latency: VirtualTime,
    /// Jitter as a fraction of the base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Packets are dropped with this
    /// probability, silently toward the sender.
    pub loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency: VirtualTime::from_millis(2),
            jitter_fraction: 0.0,
            loss_rate: 0.0,
        }
    }
}

/// Errors from substrate configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("address {0} is already assigned to a node")]
    AddressInUse(Ipv4Addr),
}

/// In-memory packet delivery.
///
/// Owns the interface address table and decides, per packet, whether it
/// is delivered and with what one-way latency. Loss produces no
/// notification back to the sender, only a missing receive; the gap
/// shows up in the flow counters.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Interface address -> owning node.
    interfaces: HashMap<Ipv4Addr, NodeId>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            interfaces: HashMap::new(),
        }
    }

    /// Assign `address` to `node`. Addresses are unique network-wide.
    pub fn add_interface(&mut self, address: Ipv4Addr, node: NodeId) -> Result<(), NetworkError> {
        if self.interfaces.contains_key(&address) {
            return Err(NetworkError::AddressInUse(address));
        }
        self.interfaces.insert(address, node);
        Ok(())
    }

    /// Node owning `address`, if any.
    pub fn resolve(&self, address: Ipv4Addr) -> Option<NodeId> {
        self.interfaces.get(&address).copied()
    }

    /// Check if a packet should be dropped based on the configured loss
    /// rate. Probabilistic but deterministic with a seeded RNG.
    pub fn should_drop(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.loss_rate > 0.0 && rng.gen::<f64>() < self.config.loss_rate
    }

    /// Set the packet loss rate (0.0 - 1.0).
    pub fn set_loss_rate(&mut self, rate: f64) {
        self.config.loss_rate = rate.clamp(0.0, 1.0);
    }

    /// Current packet loss rate.
    pub fn loss_rate(&self) -> f64 {
        self.config.loss_rate
    }

    /// Sample a one-way latency for a delivery.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> VirtualTime {
        if self.config.jitter_fraction <= 0.0 {
            return self.config.latency;
        }

        let base = self.config.latency.as_secs_f64();
        let jitter_range = base * self.config.jitter_fraction;
        let jitter = rng.gen_range(-jitter_range..jitter_range);
        VirtualTime::from_secs_f64((base + jitter).max(0.000_001))
    }

    /// Decide the fate of a packet.
    ///
    /// Returns `None` when the destination address is unknown or the
    /// loss draw fails, otherwise the destination node and a sampled
    /// one-way latency.
    pub fn transmit(&self, packet: &Packet, rng: &mut ChaCha8Rng) -> Option<(NodeId, VirtualTime)> {
        let node = match self.resolve(packet.destination()) {
            Some(node) => node,
            None => {
                trace!(destination = %packet.destination(), "packet unroutable");
                return None;
            }
        };
        if self.should_drop(rng) {
            trace!(destination = %packet.destination(), "packet dropped by loss");
            return None;
        }
        Some((node, self.sample_latency(rng)))
    }

    /// Substrate configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}
