//! Identity, topic, and message construction for the mote
//!
//! Everything in this module writes into fixed-capacity buffers and fails
//! closed: a value that does not fit yields [`Overflow`] instead of being
//! truncated.

use thiserror::Error;

pub mod identity;
pub mod telemetry;

pub use identity::{Identity, IdentityBuffer, IDENTITY_CAPACITY};
pub use telemetry::{encode_telemetry, SensorSample, TelemetryBuffer, TELEMETRY_CAPACITY};

/// A formatted value did not fit its fixed-capacity buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("formatted value exceeds buffer capacity of {capacity} bytes")]
pub struct Overflow {
    pub capacity: usize,
}
