//! Core types for the flowsim network simulator.
//!
//! Everything here is a plain value: virtual timestamps, packets, and the
//! five-tuple flow identity derived from them. Behavior (scheduling,
//! delivery, aggregation) lives in `flowsim-simulation`.

mod flow;
mod packet;
mod time;

pub use flow::FlowKey;
pub use packet::{NodeId, Packet, Protocol};
pub use time::VirtualTime;
