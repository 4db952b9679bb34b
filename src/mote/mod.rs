//! Mote lifecycle control
//!
//! The state machine deciding when to connect, subscribe, reconfigure, and
//! publish, plus the cooperative event loop that drives it.

pub mod lifecycle;
pub mod retry;
pub mod runtime;

pub use lifecycle::{Mote, MoteState, Timing};
pub use retry::{backoff_delay, ReconnectPolicy, RetryState};
pub use runtime::MoteRuntime;
