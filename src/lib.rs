//! Telemote - mote telemetry controller
//!
//! Connection-lifecycle and telemetry-publishing controller for a constrained
//! sensor node that reports readings to an MQTT broker.
//!
//! # Overview
//!
//! This crate provides:
//! - A configuration store with compiled-in defaults and a validated
//!   override path
//! - Identity and topic construction over fixed-capacity buffers that fail
//!   closed on overflow
//! - A bounded telemetry encoder with a stable wire contract
//! - The cooperative connection-lifecycle state machine with capped
//!   exponential reconnect backoff
//! - An MQTT transport built on rumqttc, driven entirely by the machine
//!
//! # Quick Start
//!
//! ```rust
//! use telemote::config::ClientConfig;
//! use telemote::protocol::identity::Identity;
//! use telemote::protocol::telemetry::{encode_telemetry, SensorSample};
//!
//! let config = ClientConfig::default();
//! let address = [0x00, 0x12, 0x4b, 0x00, 0x0a, 0x50, 0x2e, 0x61];
//!
//! let identity = Identity::build(&config, &address).unwrap();
//! assert_eq!(identity.short_id.as_str(), "mtdssens-2e61");
//!
//! let sample = SensorSample {
//!     temperature_c: 21.5,
//!     humidity: 61.25,
//! };
//! let message = encode_telemetry(identity.short_id.as_str(), 1, &sample, None).unwrap();
//! assert!(message.as_str().contains("\"seq\":1"));
//! ```

pub mod config;
pub mod error;
pub mod mote;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod sensor;
pub mod testing;
pub mod transport;

pub use config::{ClientConfig, ConfigField};
pub use error::{MoteError, MoteResult};
pub use mote::{Mote, MoteRuntime, MoteState, ReconnectPolicy, Timing};
pub use protocol::{Identity, Overflow, SensorSample};
pub use transport::mqtt::MqttLink;
pub use transport::{ClientEvent, ProtocolClient};
