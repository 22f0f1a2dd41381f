//! Event queue ordering.

use flowsim_types::VirtualTime;
use std::cmp::Ordering;

/// Key for ordering events in the scheduler's queue.
///
/// Events are ordered by:
/// 1. Fire time (earlier first)
/// 2. Sequence number (FIFO for events with the same fire time)
///
/// The sequence number is assigned at scheduling time and increases
/// monotonically for the lifetime of a scheduler, so two events with the
/// same fire time always execute in the order they were scheduled.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event fires.
    pub time: VirtualTime,
    /// Scheduling order, for deterministic FIFO tie-breaking.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
