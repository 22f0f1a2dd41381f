//! Per-flow report: the consumer of the monitor's final snapshot.

use flowsim_simulation::Simulation;
use flowsim_types::FlowKey;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// One flow's line in the report.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReportEntry {
    /// The flow's five-tuple.
    pub flow: FlowKey,
    /// Packets sent.
    pub tx_packets: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Bytes sent.
    pub tx_bytes: u64,
    /// Bytes received.
    pub rx_bytes: u64,
    /// Packets that never arrived.
    pub lost_packets: u64,
    /// Throughput in Mbps, when measurable.
    pub throughput_mbps: Option<f64>,
    /// Mean one-way delay in milliseconds, when measurable.
    pub avg_delay_ms: Option<f64>,
}

/// Final per-flow report for a run.
///
/// Built once, after `run_until` has returned, from a single snapshot —
/// so every line is internally consistent.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    /// Virtual time the run covered, in seconds.
    pub duration_secs: f64,
    /// Packets handed to the substrate.
    pub packets_sent: u64,
    /// Packets that reached a bound receiver.
    pub packets_delivered: u64,
    /// Packets dropped by the loss draw.
    pub packets_dropped_loss: u64,
    /// Per-flow breakdown, in flow-key order.
    pub flows: Vec<FlowReportEntry>,
}

impl FlowReport {
    /// Build the report from a finished simulation.
    pub fn from_simulation(sim: &Simulation) -> Self {
        let stats = sim.stats();
        let flows = sim
            .snapshot()
            .into_iter()
            .map(|(flow, stats)| {
                let metrics = stats.metrics();
                FlowReportEntry {
                    flow,
                    tx_packets: stats.tx_packets,
                    rx_packets: stats.rx_packets,
                    tx_bytes: stats.tx_bytes,
                    rx_bytes: stats.rx_bytes,
                    lost_packets: stats.tx_packets.saturating_sub(stats.rx_packets),
                    throughput_mbps: metrics.throughput_mbps,
                    avg_delay_ms: metrics.avg_delay.map(|d| d.as_secs_f64() * 1_000.0),
                }
            })
            .collect();

        Self {
            duration_secs: sim.now().as_secs_f64(),
            packets_sent: stats.packets_sent,
            packets_delivered: stats.packets_delivered,
            packets_dropped_loss: stats.packets_dropped_loss,
            flows,
        }
    }

    /// Print a summary of the report.
    pub fn print_summary(&self) {
        println!();
        println!("====================== FLOW STATISTICS ======================");
        println!("Duration:           {:.2}s", self.duration_secs);
        println!("Packets Sent:       {}", self.packets_sent);
        println!("Packets Delivered:  {}", self.packets_delivered);
        println!("Packets Lost:       {}", self.packets_dropped_loss);
        println!("Flows Observed:     {}", self.flows.len());
        println!();

        println!(
            "{:<40} {:>5} {:>5} {:>5} {:>12} {:>10}",
            "Flow", "Tx", "Rx", "Lost", "Mbps", "Delay"
        );
        println!("{}", "-".repeat(82));

        for entry in &self.flows {
            println!(
                "{:<40} {:>5} {:>5} {:>5} {:>12} {:>10}",
                entry.flow.to_string(),
                entry.tx_packets,
                entry.rx_packets,
                entry.lost_packets,
                fmt_throughput(entry.throughput_mbps),
                fmt_delay(entry.avg_delay_ms),
            );
        }
        println!("==============================================================");
    }

    /// Save the report as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

fn fmt_throughput(mbps: Option<f64>) -> String {
    match mbps {
        Some(value) => format!("{value:.4}"),
        None => "-".to_string(),
    }
}

fn fmt_delay(ms: Option<f64>) -> String {
    match ms {
        Some(value) => format!("{value:.3}ms"),
        None => "-".to_string(),
    }
}
