//! MQTT protocol client over rumqttc
//!
//! Thin, non-blocking wrapper around `rumqttc::AsyncClient`. The wrapper owns
//! no policy: reconnection decisions belong to the lifecycle state machine,
//! so a connection error ends the event task and surfaces as a single
//! [`ClientEvent::Disconnected`] instead of being retried here.

use crate::transport::{ClientEvent, ProtocolClient, QoS, TransportError};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Request queue depth handed to rumqttc
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// Connection state shared with the event task
#[derive(Debug, Default)]
struct LinkShared {
    connected: AtomicBool,
    inflight: AtomicUsize,
}

/// MQTT implementation of [`ProtocolClient`]
pub struct MqttLink {
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client: Option<AsyncClient>,
    event_task: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    shared: Arc<LinkShared>,
}

impl MqttLink {
    /// Create a link that reports its events on `events`
    pub fn new(events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            client_id: None,
            username: None,
            password: None,
            client: None,
            event_task: None,
            events,
            shared: Arc::new(LinkShared::default()),
        }
    }

    fn teardown(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        self.client = None;
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.inflight.store(0, Ordering::SeqCst);
    }

    fn map_client_error(error: ClientError) -> TransportError {
        match error {
            ClientError::TryRequest(_) => TransportError::QueueFull,
            ClientError::Request(_) => TransportError::NotConnected,
        }
    }

    fn map_qos(qos: QoS) -> rumqttc::QoS {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }

    fn track_send<T>(
        &self,
        result: Result<T, ClientError>,
    ) -> Result<(), TransportError> {
        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                self.shared
                    .inflight
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                        count.checked_sub(1)
                    })
                    .ok();
                Err(Self::map_client_error(error))
            }
        }
    }

    fn connected_client(&self) -> Result<&AsyncClient, TransportError> {
        self.client.as_ref().ok_or(TransportError::NotConnected)
    }
}

impl ProtocolClient for MqttLink {
    fn register(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.teardown();
        self.client_id = Some(client_id.to_string());
        debug!(client_id, "registered mqtt session identity");
        Ok(())
    }

    fn set_credentials(&mut self, username: &str, password: &str) {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
    }

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        keep_alive: Duration,
    ) -> Result<(), TransportError> {
        let client_id = self
            .client_id
            .clone()
            .ok_or(TransportError::NotRegistered)?;
        self.teardown();

        let mut options = MqttOptions::new(client_id, host, port);
        // rumqttc rejects keep-alives under five seconds
        options.set_keep_alive(keep_alive.max(Duration::from_secs(5)));
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        self.client = Some(client);
        self.event_task = Some(tokio::spawn(run_event_loop(
            event_loop,
            self.shared.clone(),
            self.events.clone(),
        )));
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(client) = &self.client {
            client.try_disconnect().ok();
        }
        self.teardown();
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        let result = client.try_subscribe(topic, Self::map_qos(qos));
        self.track_send(result)
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        let result = client.try_unsubscribe(topic);
        self.track_send(result)
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        let client = self.connected_client()?;
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        let result = client.try_publish(topic, Self::map_qos(qos), retain, payload.to_vec());
        self.track_send(result)
    }

    fn is_ready(&self) -> bool {
        self.client.is_some() && self.shared.connected.load(Ordering::SeqCst)
    }

    fn is_flushed(&self) -> bool {
        self.shared.inflight.load(Ordering::SeqCst) == 0
    }
}

/// Forward rumqttc events as tagged [`ClientEvent`]s until the connection
/// fails or the consumer goes away
async fn run_event_loop(
    mut event_loop: EventLoop,
    shared: Arc<LinkShared>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    loop {
        let forwarded = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                shared.connected.store(true, Ordering::SeqCst);
                events.send(ClientEvent::Connected)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => events.send(ClientEvent::Message {
                topic: publish.topic.clone(),
                payload: publish.payload.to_vec(),
                first_chunk: true,
            }),
            Ok(Event::Incoming(Packet::PubAck(_))) => events.send(ClientEvent::PublishAcked),
            Ok(Event::Incoming(Packet::SubAck(_))) => events.send(ClientEvent::SubscribeAcked),
            Ok(Event::Incoming(Packet::UnsubAck(_))) => events.send(ClientEvent::UnsubscribeAcked),
            Ok(Event::Outgoing(
                Outgoing::Publish(_) | Outgoing::Subscribe(_) | Outgoing::Unsubscribe(_),
            )) => {
                shared
                    .inflight
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                        count.checked_sub(1)
                    })
                    .ok();
                Ok(())
            }
            Ok(event) => {
                trace!(?event, "unhandled mqtt event");
                Ok(())
            }
            Err(error) => {
                shared.connected.store(false, Ordering::SeqCst);
                shared.inflight.store(0, Ordering::SeqCst);
                events
                    .send(ClientEvent::Disconnected {
                        reason: error.to_string(),
                    })
                    .ok();
                return;
            }
        };

        if forwarded.is_err() {
            // consumer dropped; nothing left to report to
            return;
        }
    }
}
