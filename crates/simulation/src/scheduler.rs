//! Virtual-time event scheduler.

use crate::event_queue::EventKey;
use flowsim_types::VirtualTime;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from [`Scheduler::schedule`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduling with a negative delay is a contract violation by the
    /// caller and is rejected synchronously.
    #[error("cannot schedule an event with negative delay {0:?}")]
    InvalidDelay(VirtualTime),
}

/// Handle to a scheduled event, usable to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandle(EventKey);

/// A virtual-time priority queue of pending events.
///
/// All activity in a simulation happens by scheduling an event for a
/// future virtual time. The scheduler is an explicit instance owned by
/// its caller; there is no ambient global clock.
///
/// Execution is single-threaded and cooperative:
/// [`run_until`](Self::run_until) runs exactly one event to completion
/// before considering the next, and for equal fire times execution order
/// equals scheduling order.
pub struct Scheduler<E> {
    queue: BTreeMap<EventKey, E>,
    /// Increases monotonically across the whole run, never reset, so
    /// events scheduled from inside a handler keep FIFO order relative
    /// to the batch currently executing.
    sequence: u64,
    now: VirtualTime,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            sequence: 0,
            now: VirtualTime::ZERO,
        }
    }

    /// Current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Number of events waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedule `event` to fire `delay` after the current time.
    pub fn schedule(&mut self, delay: VirtualTime, event: E) -> Result<EventHandle, SchedulerError> {
        if delay.is_negative() {
            return Err(SchedulerError::InvalidDelay(delay));
        }
        let time = self.now.checked_add(delay).expect("virtual time overflow");
        self.sequence += 1;
        let key = EventKey {
            time,
            sequence: self.sequence,
        };
        self.queue.insert(key, event);
        Ok(EventHandle(key))
    }

    /// Cancel a pending event.
    ///
    /// Returns whether an event was actually removed. Cancelling an
    /// event that already fired, or was already cancelled, is a no-op.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.queue.remove(&handle.0).is_some()
    }

    /// Run until the queue is empty or the next event would fire after
    /// `stop_time`.
    ///
    /// Pops the minimum key, advances the clock to its fire time, and
    /// hands the event to `handler`. Handlers may schedule freely,
    /// including at delay zero; such events join the current batch in
    /// correct order. On return, any events left past the stop time are
    /// discarded (not executed) and the clock rests at `stop_time`.
    pub fn run_until<F>(&mut self, stop_time: VirtualTime, mut handler: F)
    where
        F: FnMut(&mut Self, E),
    {
        while let Some((&key, _)) = self.queue.first_key_value() {
            if key.time > stop_time {
                break;
            }
            let (key, event) = self.queue.pop_first().unwrap();
            self.now = key.time;
            handler(self, event);
        }

        // Anything still queued fires after the stop time: discard it
        // rather than execute it. The clock never moves backwards.
        self.queue.clear();
        if self.now < stop_time {
            self.now = stop_time;
        }
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
