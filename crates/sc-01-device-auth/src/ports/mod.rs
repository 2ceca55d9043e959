//! Ports (driven side) for the authentication subsystem.

pub mod outbound;

pub use outbound::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
