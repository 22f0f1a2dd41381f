//! Per-flow statistics aggregation.

use flowsim_types::{FlowKey, VirtualTime};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from the flow monitor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A packet was observed arriving before it was sent. This is an
    /// invariant violation in the delivery substrate, not a user error;
    /// swallowing it would silently corrupt the delay statistics.
    #[error("receive time {recv:?} precedes send time {send:?}")]
    NegativeDelay {
        send: VirtualTime,
        recv: VirtualTime,
    },
}

/// Raw counters for one flow.
///
/// Created lazily on the first observed packet of a flow and kept for
/// the lifetime of the run; flows are summarized, never torn down. The
/// rx counters may trail or exceed their tx counterparts freely: packets
/// can be lost, and a receive observation without a matching send is
/// legal input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlowStats {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    /// Time of the first observed send. Set once, never overwritten.
    pub first_tx_time: Option<VirtualTime>,
    /// Time of the latest observed receive. Monotonic max: out-of-order
    /// arrivals never move it backwards.
    pub last_rx_time: Option<VirtualTime>,
    /// Sum of per-packet one-way delays.
    pub delay_sum: VirtualTime,
}

/// Metrics derived from a flow's raw counters.
///
/// `None` means undefined, i.e. too few observations to measure. That is
/// a normal outcome (a flow that never received a packet has no
/// throughput), not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMetrics {
    /// Received bytes over the first-send-to-last-receive interval,
    /// in Mbps.
    pub throughput_mbps: Option<f64>,
    /// Mean one-way delay over received packets.
    pub avg_delay: Option<VirtualTime>,
}

impl FlowStats {
    /// Derive summary metrics.
    ///
    /// Never fails: undefined quantities come back as `None` instead of
    /// dividing by zero or reporting an infinity as if it were measured.
    pub fn metrics(&self) -> FlowMetrics {
        let throughput_mbps = match (self.first_tx_time, self.last_rx_time) {
            (Some(first), Some(last)) if last > first => {
                let interval = (last - first).as_secs_f64();
                Some(self.rx_bytes as f64 * 8.0 / interval / 1024.0 / 1024.0)
            }
            _ => None,
        };

        let avg_delay = if self.rx_packets > 0 {
            Some(self.delay_sum / self.rx_packets)
        } else {
            None
        };

        FlowMetrics {
            throughput_mbps,
            avg_delay,
        }
    }
}

/// Aggregates per-flow counters as packets are observed.
///
/// Keyed by [`FlowKey`]; the map is owned here exclusively and mutated
/// only through [`on_sent`](Self::on_sent) and
/// [`on_received`](Self::on_received), so a snapshot is always
/// internally consistent.
#[derive(Debug, Default)]
pub struct FlowMonitor {
    flows: BTreeMap<FlowKey, FlowStats>,
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a packet handed to the delivery substrate.
    pub fn on_sent(&mut self, key: FlowKey, size_bytes: u64, send_time: VirtualTime) {
        let stats = self.flows.entry(key).or_default();
        stats.tx_bytes += size_bytes;
        stats.tx_packets += 1;
        if stats.first_tx_time.is_none() {
            stats.first_tx_time = Some(send_time);
        }
    }

    /// Record a packet delivered to a receiver.
    ///
    /// The check runs before any counter moves, so a failed call leaves
    /// the flow untouched.
    pub fn on_received(
        &mut self,
        key: FlowKey,
        size_bytes: u64,
        send_time: VirtualTime,
        recv_time: VirtualTime,
    ) -> Result<(), MonitorError> {
        if recv_time < send_time {
            return Err(MonitorError::NegativeDelay {
                send: send_time,
                recv: recv_time,
            });
        }

        let stats = self.flows.entry(key).or_default();
        stats.rx_bytes += size_bytes;
        stats.rx_packets += 1;
        stats.last_rx_time = Some(match stats.last_rx_time {
            Some(last) => last.max(recv_time),
            None => recv_time,
        });
        stats.delay_sum += recv_time - send_time;
        Ok(())
    }

    /// Number of flows observed so far.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Counters for one flow, if it has been observed.
    pub fn get(&self, key: &FlowKey) -> Option<&FlowStats> {
        self.flows.get(key)
    }

    /// Read-only copy of every flow's counters.
    ///
    /// Safe to call at any time; a snapshot taken mid-run is valid, just
    /// not final.
    pub fn snapshot(&self) -> BTreeMap<FlowKey, FlowStats> {
        self.flows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsim_types::Protocol;
    use std::net::Ipv4Addr;

    fn key(source_port: u16) -> FlowKey {
        FlowKey {
            source: Ipv4Addr::new(10, 1, 1, 1),
            destination: Ipv4Addr::new(10, 1, 2, 4),
            protocol: Protocol::UDP,
            source_port,
            destination_port: 9,
        }
    }

    #[test]
    fn test_lazy_creation_on_sent() {
        let mut monitor = FlowMonitor::new();
        assert_eq!(monitor.flow_count(), 0);

        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(1));
        assert_eq!(monitor.flow_count(), 1);

        let stats = monitor.get(&key(49152)).unwrap();
        assert_eq!(stats.tx_bytes, 2048);
        assert_eq!(stats.tx_packets, 1);
        assert_eq!(stats.first_tx_time, Some(VirtualTime::from_secs(1)));
        assert_eq!(stats.rx_packets, 0);
    }

    #[test]
    fn test_first_tx_time_never_overwritten() {
        let mut monitor = FlowMonitor::new();
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(1));
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(2));

        let stats = monitor.get(&key(49152)).unwrap();
        assert_eq!(stats.first_tx_time, Some(VirtualTime::from_secs(1)));
        assert_eq!(stats.tx_packets, 2);
    }

    #[test]
    fn test_last_rx_time_is_monotonic() {
        let mut monitor = FlowMonitor::new();
        monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(1),
                VirtualTime::from_secs(5),
            )
            .unwrap();
        // Out-of-order arrival: an earlier receive must not regress the
        // field.
        monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(2),
                VirtualTime::from_secs(3),
            )
            .unwrap();

        let stats = monitor.get(&key(49152)).unwrap();
        assert_eq!(stats.last_rx_time, Some(VirtualTime::from_secs(5)));
        assert_eq!(stats.rx_packets, 2);
        assert_eq!(stats.delay_sum, VirtualTime::from_secs(5));
    }

    #[test]
    fn test_negative_delay_is_surfaced() {
        let mut monitor = FlowMonitor::new();
        let err = monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(6),
                VirtualTime::from_secs(5),
            )
            .unwrap_err();
        assert_eq!(
            err,
            MonitorError::NegativeDelay {
                send: VirtualTime::from_secs(6),
                recv: VirtualTime::from_secs(5),
            }
        );
        // The failed observation left no trace.
        assert_eq!(monitor.flow_count(), 0);
    }

    #[test]
    fn test_receive_without_send_is_tolerated() {
        // Unmatched observations are legal: the monitor never assumes
        // rx <= tx.
        let mut monitor = FlowMonitor::new();
        monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(1),
                VirtualTime::from_secs(2),
            )
            .unwrap();

        let stats = monitor.get(&key(49152)).unwrap();
        assert_eq!(stats.rx_bytes, 2048);
        assert_eq!(stats.tx_bytes, 0);
        assert_eq!(stats.first_tx_time, None);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut monitor = FlowMonitor::new();
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(1));
        monitor.on_sent(key(49153), 512, VirtualTime::from_secs(2));

        let first = monitor.snapshot();
        let second = monitor.snapshot();
        assert_eq!(first, second);

        // Snapshots are copies: later updates don't bleed into them.
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(3));
        assert_eq!(first, second);
        assert_ne!(monitor.snapshot(), first);
    }

    #[test]
    fn test_metrics_throughput() {
        let mut monitor = FlowMonitor::new();
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(1));
        monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(1),
                VirtualTime::from_secs(2),
            )
            .unwrap();

        let metrics = monitor.get(&key(49152)).unwrap().metrics();
        // 2048 bytes over 1s.
        let expected = 2048.0 * 8.0 / 1024.0 / 1024.0;
        assert!((metrics.throughput_mbps.unwrap() - expected).abs() < 1e-12);
        assert_eq!(metrics.avg_delay, Some(VirtualTime::from_secs(1)));
    }

    #[test]
    fn test_metrics_undefined_for_single_instant() {
        // One packet observed: first send and last receive bound a zero
        // interval, so throughput is undefined rather than infinite.
        let mut monitor = FlowMonitor::new();
        monitor.on_sent(key(49152), 2048, VirtualTime::from_secs(1));
        monitor
            .on_received(
                key(49152),
                2048,
                VirtualTime::from_secs(1),
                VirtualTime::from_secs(1),
            )
            .unwrap();

        let stats = monitor.get(&key(49152)).unwrap();
        assert_eq!(stats.first_tx_time, stats.last_rx_time);
        assert_eq!(stats.metrics().throughput_mbps, None);
        assert_eq!(stats.metrics().avg_delay, Some(VirtualTime::ZERO));
    }

    #[test]
    fn test_metrics_undefined_without_observations() {
        let stats = FlowStats::default();
        let metrics = stats.metrics();
        assert_eq!(metrics.throughput_mbps, None);
        assert_eq!(metrics.avg_delay, None);
    }

    #[test]
    fn test_avg_delay_divides_by_packets() {
        let mut monitor = FlowMonitor::new();
        for i in 0..4 {
            monitor
                .on_received(
                    key(49152),
                    2048,
                    VirtualTime::from_secs(i),
                    VirtualTime::from_secs(i) + VirtualTime::from_millis(2),
                )
                .unwrap();
        }

        let metrics = monitor.get(&key(49152)).unwrap().metrics();
        assert_eq!(metrics.avg_delay, Some(VirtualTime::from_millis(2)));
    }
}
