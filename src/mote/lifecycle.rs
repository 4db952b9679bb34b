//! Connection lifecycle state machine
//!
//! The controller at the heart of the mote: one cooperative state machine
//! reconciling network-join readiness, broker connection and reconnection
//! with capped exponential backoff, and the subscribe/reconfigure/publish
//! cycle. Exactly one logical thread of control runs it; asynchronous
//! transport callbacks only stage tagged events through
//! [`Mote::handle_event`] and are consumed on the next timer-driven
//! [`Mote::tick`].
//!
//! A tick returns the delay until the machine wants to run again, or `None`
//! when it is idle in a sink state and only an external event can move it.

use crate::config::ClientConfig;
use crate::mote::retry::{ReconnectPolicy, RetryState};
use crate::net::{NetworkInfo, NodeAddress};
use crate::observability::indicator::StatusIndicator;
use crate::protocol::identity::Identity;
use crate::protocol::telemetry::encode_telemetry;
use crate::sensor::SensorSource;
use crate::transport::{ClientEvent, ProtocolClient, QoS, TransportError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Username presented alongside the auth token
const TOKEN_USERNAME: &str = "use-token-auth";

/// Staging capacity for a received override payload, in bytes
pub const OVERRIDE_CAPACITY: usize = 128;

/// Indicator pulse while waiting for the network
const SEARCHING_PULSE: Duration = Duration::from_millis(125);
/// Indicator pulse while the broker handshake is in flight
const CONNECTING_PULSE: Duration = Duration::from_millis(250);
/// Indicator pulse on every publish
const PUBLISH_PULSE: Duration = Duration::from_secs(1);

/// Discrete lifecycle state; transitions are the only permitted mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoteState {
    Init,
    Registered,
    Connecting,
    Connected,
    PublishingConfig,
    Listening,
    Publishing,
    Disconnected,
    ConfigError,
    Error,
}

/// Tick cadences of the machine
#[derive(Debug, Clone)]
pub struct Timing {
    /// Fallback poll when no transition fired (half the base clock tick)
    pub machine_poll: Duration,
    /// Re-check period while waiting for the network
    pub net_check: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            machine_poll: Duration::from_millis(500),
            net_check: Duration::from_millis(250),
        }
    }
}

/// A staged override message, consumed by the next tick
#[derive(Debug, Clone, PartialEq, Eq)]
enum OverrideMessage {
    Value(heapless::String<OVERRIDE_CAPACITY>),
    Oversized { length: usize },
}

/// The lifecycle controller and owner of all mote state
pub struct Mote<C>
where
    C: ProtocolClient,
{
    config: ClientConfig,
    address: NodeAddress,
    identity: Identity,
    state: MoteState,
    retry: RetryState,
    policy: ReconnectPolicy,
    timing: Timing,
    sequence: u16,
    announced: bool,
    pending_override: Option<OverrideMessage>,
    client: C,
    network: Box<dyn NetworkInfo>,
    indicator: Box<dyn StatusIndicator>,
    sensors: Box<dyn SensorSource>,
}

impl<C> Mote<C>
where
    C: ProtocolClient,
{
    /// Create the controller and derive its identity strings
    ///
    /// An identity that does not fit its buffers is a fatal configuration
    /// condition: the machine starts in [`MoteState::ConfigError`].
    pub fn new(
        config: ClientConfig,
        client: C,
        network: Box<dyn NetworkInfo>,
        indicator: Box<dyn StatusIndicator>,
        sensors: Box<dyn SensorSource>,
    ) -> Self {
        let address = network.link_address();
        let mut mote = Self {
            config,
            address,
            identity: Identity::default(),
            state: MoteState::Init,
            retry: RetryState::default(),
            policy: ReconnectPolicy::default(),
            timing: Timing::default(),
            sequence: 0,
            announced: false,
            pending_override: None,
            client,
            network,
            indicator,
            sensors,
        };
        mote.rebuild_identity();
        mote
    }

    /// Replace the reconnect policy
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the tick cadences
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> MoteState {
        self.state
    }

    /// Current telemetry sequence number
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Reconnect attempts since the last reset
    pub fn retry_attempts(&self) -> u32 {
        self.retry.attempts()
    }

    /// Derived identity strings
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The protocol client, for inspection in tests
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one state-machine invocation
    ///
    /// Returns the delay until the next tick, or `None` when the machine is
    /// idle in a sink state.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        loop {
            match self.state {
                MoteState::Init => {
                    if let Err(err) = self.client.register(self.identity.client_id.as_str()) {
                        warn!(error = %err, "client registration rejected");
                    }
                    self.client
                        .set_credentials(TOKEN_USERNAME, self.config.auth_token.as_str());
                    self.retry.reset();
                    info!(client_id = %self.identity.client_id, "session initialized");
                    self.state = MoteState::Registered;
                    // unconditional transition; the join check runs in this
                    // same invocation
                }
                MoteState::Registered => {
                    if self.network.is_joined() {
                        info!(
                            attempt = self.retry.attempts() + 1,
                            "network joined; connecting to broker"
                        );
                        self.connect_to_broker();
                    } else {
                        self.indicator.pulse(SEARCHING_PULSE);
                        debug!("waiting for network");
                    }
                    return Some(self.timing.net_check);
                }
                MoteState::Connecting => {
                    self.indicator.pulse(CONNECTING_PULSE);
                    debug!(attempt = self.retry.attempts() + 1, "connecting to broker");
                    return Some(self.timing.machine_poll);
                }
                MoteState::Connected => {
                    if self.announced {
                        // an override was already applied; steady-state
                        // publishing resumes without a new subscription
                        self.state = MoteState::Publishing;
                        return Some(self.timing.machine_poll);
                    }
                    self.retry.note_stable(now);
                    if self.client.is_ready() && self.client.is_flushed() {
                        self.subscribe_to_overrides();
                        self.state = MoteState::PublishingConfig;
                        return Some(self.config.publish_interval);
                    }
                    debug!("waiting for client readiness before subscribing");
                    return Some(self.timing.machine_poll);
                }
                MoteState::PublishingConfig => {
                    self.retry.note_stable(now);
                    if self.client.is_ready() && self.client.is_flushed() {
                        self.indicator.pulse(PUBLISH_PULSE);
                        self.publish_announcement();
                        self.state = MoteState::Listening;
                        return Some(self.config.publish_interval);
                    }
                    debug!("waiting for client readiness before announcing");
                    return Some(self.timing.machine_poll);
                }
                MoteState::Listening => {
                    return match self.pending_override.take() {
                        Some(OverrideMessage::Value(location)) => {
                            match self.identity.retarget(location.as_str()) {
                                Ok(()) => {
                                    self.unsubscribe_from_overrides();
                                    self.sequence = 0;
                                    self.announced = true;
                                    info!(
                                        topic = %self.identity.publish_topic,
                                        "override applied; entering steady-state publishing"
                                    );
                                    self.state = MoteState::Publishing;
                                    Some(self.timing.machine_poll)
                                }
                                Err(err) => {
                                    error!(error = %err, "override rejected: topic rebuild failed");
                                    self.state = MoteState::ConfigError;
                                    None
                                }
                            }
                        }
                        Some(OverrideMessage::Oversized { length }) => {
                            error!(
                                length,
                                capacity = OVERRIDE_CAPACITY,
                                "override rejected: payload exceeds staging buffer"
                            );
                            self.state = MoteState::ConfigError;
                            None
                        }
                        None => Some(self.timing.machine_poll),
                    };
                }
                MoteState::Publishing => {
                    self.retry.note_stable(now);
                    if self.client.is_ready() && self.client.is_flushed() {
                        self.indicator.pulse(PUBLISH_PULSE);
                        self.publish_telemetry();
                        return Some(self.config.publish_interval);
                    }
                    debug!("waiting for client readiness before publishing");
                    return Some(self.timing.machine_poll);
                }
                MoteState::Disconnected => {
                    if self.retry.exhausted(&self.policy) {
                        error!(
                            attempts = self.retry.attempts(),
                            "reconnect attempts exhausted"
                        );
                        self.state = MoteState::Error;
                        return Some(self.timing.machine_poll);
                    }
                    self.client.disconnect();
                    let delay = self.retry.next_delay(&self.policy);
                    info!(
                        attempt = self.retry.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    self.state = MoteState::Registered;
                    return Some(delay);
                }
                MoteState::ConfigError => {
                    return self.try_recover_configuration();
                }
                MoteState::Error => {
                    self.indicator.on();
                    error!("terminal failure; restart required");
                    return None;
                }
            }
        }
    }

    /// Consume one asynchronous transport event
    ///
    /// Only flags and state are touched here; all real work happens on the
    /// next tick. Returns true when the machine wants that tick immediately.
    pub fn handle_event(&mut self, event: ClientEvent, now: Instant) -> bool {
        match self.state {
            MoteState::ConfigError => {
                // sink state: only a fresh override can matter
                return match event {
                    ClientEvent::Message { payload, .. } => {
                        self.stage_override(&payload);
                        true
                    }
                    other => {
                        debug!(event = ?other, "event ignored in configuration-error state");
                        false
                    }
                };
            }
            MoteState::Error => {
                debug!(event = ?event, "event ignored in terminal state");
                return false;
            }
            _ => {}
        }

        match event {
            ClientEvent::Connected => {
                info!("broker connection established");
                self.retry.mark_connected(now, &self.policy);
                self.state = MoteState::Connected;
                false
            }
            ClientEvent::Disconnected { reason } => {
                warn!(%reason, "broker connection lost");
                self.state = MoteState::Disconnected;
                true
            }
            ClientEvent::Message {
                topic,
                payload,
                first_chunk,
            } => {
                if first_chunk {
                    info!(%topic, bytes = payload.len(), "override message received");
                }
                self.stage_override(&payload);
                false
            }
            ClientEvent::PublishAcked => {
                debug!("publish acknowledged");
                false
            }
            ClientEvent::SubscribeAcked => {
                debug!("subscription acknowledged");
                false
            }
            ClientEvent::UnsubscribeAcked => {
                debug!("unsubscription acknowledged");
                false
            }
        }
    }

    /// Rebuild the identity set from the current configuration; resets the
    /// sequence counter. On overflow the machine enters `ConfigError`.
    fn rebuild_identity(&mut self) -> bool {
        match Identity::build(&self.config, &self.address) {
            Ok(identity) => {
                self.identity = identity;
                self.sequence = 0;
                true
            }
            Err(err) => {
                error!(error = %err, "identity construction failed");
                self.state = MoteState::ConfigError;
                false
            }
        }
    }

    fn connect_to_broker(&mut self) {
        let keep_alive = self.config.publish_interval.saturating_mul(3);
        if let Err(err) = self.client.connect(
            self.config.broker_host.as_str(),
            self.config.broker_port,
            keep_alive,
        ) {
            warn!(error = %err, "connect request rejected");
        }
        self.state = MoteState::Connecting;
    }

    fn subscribe_to_overrides(&mut self) {
        let topic = self.identity.subscribe_topic.clone();
        match self.client.subscribe(topic.as_str(), QoS::AtMostOnce) {
            Ok(()) => info!(topic = %topic, "subscribing to override topic"),
            Err(TransportError::QueueFull) => {
                info!("tried to subscribe but command queue was full")
            }
            Err(err) => warn!(error = %err, "subscribe rejected"),
        }
    }

    fn unsubscribe_from_overrides(&mut self) {
        let topic = self.identity.subscribe_topic.clone();
        match self.client.unsubscribe(topic.as_str()) {
            Ok(()) => info!(topic = %topic, "unsubscribing from override topic"),
            Err(TransportError::QueueFull) => {
                info!("tried to unsubscribe but command queue was full")
            }
            Err(err) => warn!(error = %err, "unsubscribe rejected"),
        }
    }

    /// Publish the configuration announcement (payload = short id)
    fn publish_announcement(&mut self) {
        let topic = self.identity.publish_topic.clone();
        let payload = self.identity.short_id.clone();
        match self.client.publish(
            topic.as_str(),
            payload.as_bytes(),
            QoS::AtMostOnce,
            false,
        ) {
            Ok(()) => {
                self.sequence = self.sequence.wrapping_add(1);
                info!(topic = %topic, "configuration announcement sent");
            }
            Err(TransportError::QueueFull) => info!("announcement deferred: command queue full"),
            Err(err) => warn!(error = %err, "announcement rejected"),
        }
    }

    /// Encode and publish one telemetry message
    ///
    /// The sequence counter only advances when the encode fits and the client
    /// accepts the message; an overflowed encode skips the cycle.
    fn publish_telemetry(&mut self) {
        let sample = self.sensors.sample();
        let route = self.network.default_route();
        let next_sequence = self.sequence.wrapping_add(1);

        let message = match encode_telemetry(
            self.identity.short_id.as_str(),
            next_sequence,
            &sample,
            route,
        ) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "telemetry encode overflowed; cycle skipped");
                return;
            }
        };

        let topic = self.identity.publish_topic.clone();
        match self.client.publish(
            topic.as_str(),
            message.as_bytes(),
            QoS::AtMostOnce,
            false,
        ) {
            Ok(()) => {
                self.sequence = next_sequence;
                info!(seq = next_sequence, topic = %topic, "telemetry published");
            }
            Err(TransportError::QueueFull) => info!("publish deferred: command queue full"),
            Err(err) => warn!(error = %err, "publish rejected"),
        }
    }

    /// Stage a received override payload for the next tick
    fn stage_override(&mut self, payload: &[u8]) {
        let text = match core::str::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                warn!("override payload is not valid UTF-8; ignored");
                return;
            }
        };
        let mut staged: heapless::String<OVERRIDE_CAPACITY> = heapless::String::new();
        self.pending_override = if staged.push_str(text).is_ok() {
            Some(OverrideMessage::Value(staged))
        } else {
            Some(OverrideMessage::Oversized {
                length: payload.len(),
            })
        };
    }

    /// Attempt to leave `ConfigError` through a fresh identity/topic build
    fn try_recover_configuration(&mut self) -> Option<Duration> {
        match self.pending_override.take() {
            Some(OverrideMessage::Value(location)) => {
                if !self.rebuild_identity() {
                    return None;
                }
                match self.identity.retarget(location.as_str()) {
                    Ok(()) => {
                        self.announced = true;
                        info!(
                            topic = %self.identity.publish_topic,
                            "configuration recovered; reinitializing session"
                        );
                        self.state = MoteState::Init;
                        Some(Duration::ZERO)
                    }
                    Err(err) => {
                        error!(error = %err, "override rejected: topic rebuild failed");
                        self.state = MoteState::ConfigError;
                        None
                    }
                }
            }
            Some(OverrideMessage::Oversized { length }) => {
                error!(
                    length,
                    capacity = OVERRIDE_CAPACITY,
                    "override rejected: payload exceeds staging buffer"
                );
                None
            }
            None => {
                error!("bad configuration; idle until reconfigured");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{CountingIndicator, FixedSensors, MockNetwork, ScriptedClient};

    const ADDRESS: NodeAddress = [0x00, 0x12, 0x4b, 0x00, 0x0a, 0x50, 0x2e, 0x61];

    fn build_mote(client: ScriptedClient, network: MockNetwork) -> Mote<ScriptedClient> {
        Mote::new(
            ClientConfig::default(),
            client,
            Box::new(network),
            Box::new(CountingIndicator::new()),
            Box::new(FixedSensors::new(21.5, 61.25)),
        )
    }

    #[test]
    fn test_init_registers_and_falls_through_to_join_check() {
        let client = ScriptedClient::new();
        let network = MockNetwork::new(ADDRESS);
        let mut mote = build_mote(client.handle(), network);

        mote.tick(Instant::now());

        assert_eq!(
            client.registrations(),
            vec!["d:mtdssens:native:00124b502e61".to_string()]
        );
        assert_eq!(
            client.credentials(),
            vec![("use-token-auth".to_string(), "AUTHZ".to_string())]
        );
        // joined network means the same invocation already initiated connect
        assert_eq!(mote.state(), MoteState::Connecting);
        assert_eq!(client.connects().len(), 1);
    }

    #[test]
    fn test_registered_waits_for_network() {
        let client = ScriptedClient::new();
        let network = MockNetwork::new(ADDRESS);
        network.set_joined(false);
        let mut mote = build_mote(client.handle(), network.handle());

        let wake = mote.tick(Instant::now());

        assert_eq!(mote.state(), MoteState::Registered);
        assert!(client.connects().is_empty());
        assert_eq!(wake, Some(Timing::default().net_check));

        // next tick after the network comes up moves on to the broker
        network.set_joined(true);
        mote.tick(Instant::now());
        assert_eq!(mote.state(), MoteState::Connecting);
    }

    #[test]
    fn test_connect_uses_broker_config_and_keepalive() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));

        mote.tick(Instant::now());

        let connects = client.connects();
        assert_eq!(connects[0].0, "127.0.0.1");
        assert_eq!(connects[0].1, 1883);
        // keepalive is three publish intervals
        assert_eq!(connects[0].2, Duration::from_secs(180));
    }

    #[test]
    fn test_connected_subscribes_once_ready() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);

        // not ready yet: stay in Connected on the fallback poll
        let wake = mote.tick(now);
        assert_eq!(mote.state(), MoteState::Connected);
        assert_eq!(wake, Some(Timing::default().machine_poll));
        assert!(client.subscribes().is_empty());

        client.set_ready(true);
        let wake = mote.tick(now);
        assert_eq!(mote.state(), MoteState::PublishingConfig);
        assert_eq!(client.subscribes(), vec!["mote/cfg/mtdssens-2e61/+".to_string()]);
        // after the subscribe the next tick is a full publish interval away
        assert_eq!(wake, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_announcement_carries_short_id_and_bumps_sequence() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);

        assert_eq!(mote.sequence(), 0);
        mote.tick(now);

        assert_eq!(mote.state(), MoteState::Listening);
        let publishes = client.publishes();
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0].0, "mote/cfg/announce");
        assert_eq!(publishes[0].1, b"mtdssens-2e61".to_vec());
        assert_eq!(mote.sequence(), 1);
    }

    #[test]
    fn test_override_retargets_and_resets_sequence() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now); // subscribe
        mote.tick(now); // announce -> Listening

        mote.handle_event(
            ClientEvent::Message {
                topic: "mote/cfg/mtdssens-2e61/loc".to_string(),
                payload: b"greenhouse/row4".to_vec(),
                first_chunk: true,
            },
            now,
        );
        mote.tick(now);

        assert_eq!(mote.state(), MoteState::Publishing);
        assert_eq!(mote.sequence(), 0);
        assert_eq!(
            mote.identity().publish_topic.as_str(),
            "mote/loc/greenhouse/row4"
        );
        assert_eq!(
            client.unsubscribes(),
            vec!["mote/cfg/mtdssens-2e61/+".to_string()]
        );
    }

    #[test]
    fn test_telemetry_publish_increments_sequence() {
        let client = ScriptedClient::new();
        let route = "192.0.2.7".parse().unwrap();
        let network = MockNetwork::new(ADDRESS).with_route(route);
        let mut mote = build_mote(client.handle(), network);
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now); // subscribe
        mote.tick(now); // announce
        mote.handle_event(
            ClientEvent::Message {
                topic: "mote/cfg/mtdssens-2e61/loc".to_string(),
                payload: b"lab".to_vec(),
                first_chunk: true,
            },
            now,
        );
        mote.tick(now); // apply override

        let wake = mote.tick(now); // publish telemetry

        assert_eq!(mote.sequence(), 1);
        assert_eq!(wake, Some(Duration::from_secs(60)));
        let publishes = client.publishes();
        let (topic, payload) = publishes.last().unwrap();
        assert_eq!(topic, "mote/loc/lab");
        let text = String::from_utf8(payload.clone()).unwrap();
        assert!(text.contains("\"s_id\":\"mtdssens-2e61\""));
        assert!(text.contains("\"seq\":1"));
        assert!(text.contains("\"temp_c\":21.50"));
        assert!(text.contains("\"Def Route\":\"192.0.2.7\""));
    }

    #[test]
    fn test_rejected_publish_does_not_advance_sequence() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);
        mote.tick(now);
        mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: b"lab".to_vec(),
                first_chunk: true,
            },
            now,
        );
        mote.tick(now);

        client.fail_next_send(TransportError::QueueFull);
        mote.tick(now);

        assert_eq!(mote.sequence(), 0, "rejected publish must not count");
        assert_eq!(mote.state(), MoteState::Publishing);
    }

    #[test]
    fn test_oversized_override_enters_config_error() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);
        mote.tick(now);

        mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: vec![b'x'; OVERRIDE_CAPACITY + 1],
                first_chunk: true,
            },
            now,
        );
        let wake = mote.tick(now);

        assert_eq!(mote.state(), MoteState::ConfigError);
        assert_eq!(wake, None, "sink state idles until reconfigured");
        // no telemetry was ever published
        assert_eq!(client.publishes().len(), 1);
    }

    #[test]
    fn test_config_error_recovers_on_valid_override() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);
        mote.tick(now);
        mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: vec![b'x'; OVERRIDE_CAPACITY + 1],
                first_chunk: true,
            },
            now,
        );
        mote.tick(now);
        assert_eq!(mote.state(), MoteState::ConfigError);

        let wants_tick = mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: b"lab".to_vec(),
                first_chunk: true,
            },
            now,
        );
        assert!(wants_tick);
        let wake = mote.tick(now);

        assert_eq!(mote.state(), MoteState::Init);
        assert_eq!(wake, Some(Duration::ZERO));
        assert_eq!(mote.identity().publish_topic.as_str(), "mote/loc/lab");
    }

    #[test]
    fn test_connection_events_ignored_in_sink_states() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);
        mote.tick(now);
        mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: vec![b'x'; OVERRIDE_CAPACITY + 1],
                first_chunk: true,
            },
            now,
        );
        mote.tick(now);
        assert_eq!(mote.state(), MoteState::ConfigError);

        mote.handle_event(ClientEvent::Connected, now);
        assert_eq!(mote.state(), MoteState::ConfigError);
        mote.handle_event(
            ClientEvent::Disconnected {
                reason: "peer closed".to_string(),
            },
            now,
        );
        assert_eq!(mote.state(), MoteState::ConfigError);
    }

    #[test]
    fn test_disconnect_schedules_backoff_and_reregisters() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);

        let wants_tick = mote.handle_event(
            ClientEvent::Disconnected {
                reason: "connection refused".to_string(),
            },
            now,
        );
        assert!(wants_tick, "a disconnect requests an immediate tick");

        let wake = mote.tick(now);
        assert_eq!(mote.state(), MoteState::Registered);
        assert_eq!(client.disconnects(), 1);
        assert_eq!(wake, Some(Duration::from_secs(4)), "first retry waits 2B");
    }

    #[test]
    fn test_attempt_limit_reaches_terminal_error() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS)).with_policy(
            ReconnectPolicy {
                max_attempts: Some(1),
                ..ReconnectPolicy::default()
            },
        );
        let now = Instant::now();
        mote.tick(now);

        mote.handle_event(
            ClientEvent::Disconnected {
                reason: "refused".to_string(),
            },
            now,
        );
        mote.tick(now); // retry 1 scheduled
        mote.tick(now); // Registered -> Connecting again
        mote.handle_event(
            ClientEvent::Disconnected {
                reason: "refused".to_string(),
            },
            now,
        );
        mote.tick(now); // limit exhausted

        assert_eq!(mote.state(), MoteState::Error);
        let wake = mote.tick(now);
        assert_eq!(wake, None, "terminal state idles");
    }

    #[test]
    fn test_reconnect_after_announce_skips_subscribe() {
        let client = ScriptedClient::new();
        let mut mote = build_mote(client.handle(), MockNetwork::new(ADDRESS));
        let now = Instant::now();
        mote.tick(now);
        mote.handle_event(ClientEvent::Connected, now);
        client.set_ready(true);
        mote.tick(now);
        mote.tick(now);
        mote.handle_event(
            ClientEvent::Message {
                topic: "t".to_string(),
                payload: b"lab".to_vec(),
                first_chunk: true,
            },
            now,
        );
        mote.tick(now);
        assert_eq!(mote.state(), MoteState::Publishing);
        let subscribes_before = client.subscribes().len();

        mote.handle_event(
            ClientEvent::Disconnected {
                reason: "keepalive timeout".to_string(),
            },
            now,
        );
        mote.tick(now); // backoff, -> Registered
        mote.tick(now); // -> Connecting
        mote.handle_event(ClientEvent::Connected, now);
        mote.tick(now); // Connected with announce done

        assert_eq!(mote.state(), MoteState::Publishing);
        assert_eq!(client.subscribes().len(), subscribes_before);
    }
}
