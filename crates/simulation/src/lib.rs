//! Deterministic per-flow network simulation core.
//!
//! This crate provides a discrete-event simulation of small
//! packet-switched topologies that measures per-flow throughput, delay,
//! and loss. Given the same seed, it produces identical results every
//! run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Simulation                         │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Scheduler (BTreeMap<EventKey, SimEvent>)       │ │
//! │  │     Ordered by: fire time, sequence                │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Applications emit packets; the substrate       │ │
//! │  │     decides delivery (latency, jitter, loss)       │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     classify() -> FlowKey -> FlowMonitor counters  │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod classifier;
mod event_queue;
mod monitor;
mod network;
mod runner;
mod scheduler;
mod traffic;

pub use classifier::classify;
pub use event_queue::EventKey;
pub use monitor::{FlowMetrics, FlowMonitor, FlowStats, MonitorError};
pub use network::{NetworkConfig, NetworkError, SimulatedNetwork};
pub use runner::{SimEvent, Simulation, SimulationError, SimulationStats};
pub use scheduler::{EventHandle, Scheduler, SchedulerError};
pub use traffic::{
    Application, ApplicationError, ConfigError, PassiveReceiver, PeriodicSender,
    PeriodicSenderConfig,
};

/// Index of an installed application within a [`Simulation`].
///
/// A simulation-local handle for routing start/stop requests and inbound
/// packets; it has no meaning outside the simulation that issued it.
pub type AppId = usize;
