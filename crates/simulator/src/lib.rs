//! flowsim scenario runner.
//!
//! Builds small packet-switched topologies on top of the simulation
//! core, runs synthetic traffic through them, and emits a per-flow
//! report (throughput, delay, loss).
//!
//! # Example
//!
//! ```ignore
//! use flowsim_simulation::Simulation;
//! use flowsim_simulator::{build_scenario, FlowReport, ScenarioConfig};
//!
//! let config = ScenarioConfig::new(3).with_seed(42);
//! let mut sim = Simulation::new(config.to_network_config(), config.seed);
//! build_scenario(&config, &mut sim).unwrap();
//! sim.run_until(config.stop_time);
//!
//! let report = FlowReport::from_simulation(&sim);
//! report.print_summary();
//! ```

pub mod config;
pub mod report;
pub mod scenario;

pub use config::ScenarioConfig;
pub use report::{FlowReport, FlowReportEntry};
pub use scenario::build_scenario;
