//! Status indicator
//!
//! Stand-in for the node's status LED. The machine drives it with short
//! pulses while searching, connecting, and publishing, and leaves it on in
//! the terminal error state.

use std::time::Duration;
use tracing::debug;

/// Visual feedback sink
pub trait StatusIndicator: Send {
    fn on(&mut self);
    fn off(&mut self);
    fn pulse(&mut self, duration: Duration);
}

/// Indicator that reports state changes on the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn on(&mut self) {
        debug!("status indicator on");
    }

    fn off(&mut self) {
        debug!("status indicator off");
    }

    fn pulse(&mut self, duration: Duration) {
        debug!(duration_ms = duration.as_millis() as u64, "status indicator pulse");
    }
}
