//! Observability for the mote controller
//!
//! Structured logging and the status indicator. Both are purely for humans
//! watching the node; neither is a functional dependency of the lifecycle
//! machine.

pub mod indicator;
pub mod logging;

pub use indicator::{LogIndicator, StatusIndicator};
pub use logging::{init_default_logging, init_logging, LogFormat};
