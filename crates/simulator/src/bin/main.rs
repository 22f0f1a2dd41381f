//! flowsim CLI
//!
//! Run deterministic per-flow network simulations with configurable
//! parameters.
//!
//! # Example
//!
//! ```bash
//! # Run the default scenario with a fixed seed
//! flowsim --seed 42 -n 3 -c 3
//!
//! # A lossy run, with the report saved to a file
//! flowsim --loss 0.2 --jitter 0.1 -o flows.json
//! ```

use clap::Parser;
use flowsim_simulation::Simulation;
use flowsim_simulator::{build_scenario, FlowReport, ScenarioConfig};
use flowsim_types::VirtualTime;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// flowsim
///
/// Simulates a small packet-switched topology under periodic traffic and
/// reports per-flow throughput, delay, and loss. Single-threaded,
/// reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "flowsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of LAN nodes beside the point-to-point sender
    #[arg(short = 'n', long, default_value = "3")]
    lan_nodes: u32,

    /// Simulation stop time in seconds
    #[arg(short = 'd', long, default_value = "15.0")]
    duration: f64,

    /// Seconds between packets from each sender
    #[arg(long, default_value = "0.2")]
    interval: f64,

    /// Payload size in bytes
    #[arg(long, default_value = "2048")]
    packet_size: u32,

    /// Packets per sender
    #[arg(short = 'c', long, default_value = "3")]
    count: u32,

    /// One-way link latency in milliseconds
    #[arg(long, default_value = "2.0")]
    latency_ms: f64,

    /// Latency jitter as a fraction of the base latency (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    jitter: f64,

    /// Packet loss rate (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    loss: f64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the per-flow report to this JSON file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,flowsim_simulator=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let config = ScenarioConfig::new(args.lan_nodes)
        .with_interval(VirtualTime::from_secs_f64(args.interval))
        .with_packet_size(args.packet_size)
        .with_max_packets(args.count)
        .with_stop_time(VirtualTime::from_secs_f64(args.duration))
        .with_latency(VirtualTime::from_secs_f64(args.latency_ms / 1_000.0))
        .with_jitter_fraction(args.jitter)
        .with_loss_rate(args.loss)
        .with_seed(seed);

    info!(
        lan_nodes = args.lan_nodes,
        duration_secs = args.duration,
        seed,
        loss = config.loss_rate,
        "Starting simulation"
    );

    let mut sim = Simulation::new(config.to_network_config(), config.seed);
    if let Err(e) = build_scenario(&config, &mut sim) {
        eprintln!("failed to build scenario: {e}");
        return ExitCode::FAILURE;
    }

    sim.run_until(config.stop_time);

    // The report consumes one final snapshot, after the run is over.
    let report = FlowReport::from_simulation(&sim);
    report.print_summary();

    if let Some(path) = args.output {
        match report.save_json(&path) {
            Ok(()) => info!(path = %path.display(), "Saved flow report"),
            Err(e) => {
                eprintln!("failed to write {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
