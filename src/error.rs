//! Top-level error types for the mote controller
//!
//! Every concern carries its own error enum (`ConfigError`, `Overflow`,
//! `TransportError`); this module folds them into the single result type the
//! binary and runtime surface to callers.

use thiserror::Error;

/// Main error type for mote controller operations
#[derive(Debug, Error)]
pub enum MoteError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("buffer overflow: {0}")]
    Overflow(#[from] crate::protocol::Overflow),

    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("controller stopped: {message}")]
    Stopped { message: String },
}

impl MoteError {
    /// Create a terminal-stop error
    pub fn stopped<S: Into<String>>(message: S) -> Self {
        Self::Stopped {
            message: message.into(),
        }
    }
}

/// Result type for mote controller operations
pub type MoteResult<T> = Result<T, MoteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Overflow;

    #[test]
    fn test_overflow_conversion() {
        let error: MoteError = Overflow { capacity: 64 }.into();
        assert!(matches!(error, MoteError::Overflow(_)));
        assert!(error.to_string().contains("64"));
    }

    #[test]
    fn test_stopped_constructor() {
        let error = MoteError::stopped("reconnect attempts exhausted");
        assert!(matches!(error, MoteError::Stopped { .. }));
        assert_eq!(
            error.to_string(),
            "controller stopped: reconnect attempts exhausted"
        );
    }
}
