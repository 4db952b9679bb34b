//! Transport layer for broker communication
//!
//! This module provides the protocol-client abstraction the lifecycle state
//! machine drives, plus the MQTT implementation. Every operation here is
//! non-blocking: sends either enqueue immediately or fail with
//! [`TransportError::QueueFull`], and connection progress is reported through
//! [`ClientEvent`]s posted on a channel the state machine consumes.

use std::time::Duration;
use thiserror::Error;

pub mod mqtt;

/// Delivery guarantee for a subscription or publish
///
/// The mote itself only ever uses [`QoS::AtMostOnce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Asynchronous event from the protocol client
///
/// Events are tagged values only; the state machine consumes them on its next
/// invocation and no handler performs long work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Broker accepted the connection
    Connected,
    /// Connection lost, with the transport's reason
    Disconnected { reason: String },
    /// A message arrived on a subscribed topic
    Message {
        topic: String,
        payload: Vec<u8>,
        first_chunk: bool,
    },
    /// Outbound publish acknowledged by the broker
    PublishAcked,
    /// Subscription acknowledged
    SubscribeAcked,
    /// Unsubscription acknowledged
    UnsubscribeAcked,
}

/// Non-fatal transport rejections
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("command queue full")]
    QueueFull,
    #[error("not connected to broker")]
    NotConnected,
    #[error("client not registered")]
    NotRegistered,
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Protocol client contract the state machine drives
///
/// Implementations must never block: `connect` only initiates the handshake
/// (completion arrives as [`ClientEvent::Connected`]), and the send methods
/// enqueue or fail. The two predicates are polled before every send.
pub trait ProtocolClient: Send {
    /// Register the session identity with the protocol implementation
    fn register(&mut self, client_id: &str) -> Result<(), TransportError>;

    /// Store the credentials used on the next connect
    fn set_credentials(&mut self, username: &str, password: &str);

    /// Initiate a broker connection
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        keep_alive: Duration,
    ) -> Result<(), TransportError>;

    /// Tear down the current connection, if any
    fn disconnect(&mut self);

    /// Enqueue a subscription request
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), TransportError>;

    /// Enqueue an unsubscription request
    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Enqueue one message for publication
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError>;

    /// Whether the connection is established and usable
    fn is_ready(&self) -> bool;

    /// Whether every previously enqueued send has left the client
    fn is_flushed(&self) -> bool;
}
