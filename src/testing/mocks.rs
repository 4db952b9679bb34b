//! Mock implementations for testing
//!
//! Provides mock ProtocolClient, NetworkInfo, StatusIndicator, and
//! SensorSource implementations so the state machine can be driven
//! tick-by-tick in tests. Every mock hands out cloneable handles backed by
//! shared state, because the machine takes ownership of its collaborators.

use crate::net::{NetworkInfo, NodeAddress};
use crate::observability::indicator::StatusIndicator;
use crate::protocol::SensorSample;
use crate::sensor::SensorSource;
use crate::transport::{ProtocolClient, QoS, TransportError};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the mote asked the protocol client to do
#[derive(Debug, Default)]
pub struct ClientLog {
    pub registrations: Vec<String>,
    pub credentials: Vec<(String, String)>,
    pub connects: Vec<(String, u16, Duration)>,
    pub disconnects: usize,
    pub subscribes: Vec<String>,
    pub unsubscribes: Vec<String>,
    pub publishes: Vec<(String, Vec<u8>)>,
}

/// Scriptable protocol client
///
/// Readiness and flush state are set by the test; sends are recorded in the
/// shared [`ClientLog`]. `fail_next_send` makes exactly one following send
/// fail with the given error.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    log: Arc<Mutex<ClientLog>>,
    ready: Arc<AtomicBool>,
    flushed: Arc<AtomicBool>,
    fail_next: Arc<Mutex<Option<TransportError>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        let client = Self::default();
        client.flushed.store(true, Ordering::SeqCst);
        client
    }

    /// A handle observing (and scripting) the same client state
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_flushed(&self, flushed: bool) {
        self.flushed.store(flushed, Ordering::SeqCst);
    }

    pub fn fail_next_send(&self, error: TransportError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn registrations(&self) -> Vec<String> {
        self.log.lock().unwrap().registrations.clone()
    }

    pub fn credentials(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().credentials.clone()
    }

    pub fn connects(&self) -> Vec<(String, u16, Duration)> {
        self.log.lock().unwrap().connects.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.log.lock().unwrap().disconnects
    }

    pub fn subscribes(&self) -> Vec<String> {
        self.log.lock().unwrap().subscribes.clone()
    }

    pub fn unsubscribes(&self) -> Vec<String> {
        self.log.lock().unwrap().unsubscribes.clone()
    }

    pub fn publishes(&self) -> Vec<(String, Vec<u8>)> {
        self.log.lock().unwrap().publishes.clone()
    }

    fn take_failure(&self) -> Option<TransportError> {
        self.fail_next.lock().unwrap().take()
    }
}

impl ProtocolClient for ScriptedClient {
    fn register(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .registrations
            .push(client_id.to_string());
        Ok(())
    }

    fn set_credentials(&mut self, username: &str, password: &str) {
        self.log
            .lock()
            .unwrap()
            .credentials
            .push((username.to_string(), password.to_string()));
    }

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        keep_alive: Duration,
    ) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .connects
            .push((host.to_string(), port, keep_alive));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.ready.store(false, Ordering::SeqCst);
        self.log.lock().unwrap().disconnects += 1;
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.log.lock().unwrap().subscribes.push(topic.to_string());
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.log
            .lock()
            .unwrap()
            .unsubscribes
            .push(topic.to_string());
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        _qos: QoS,
        _retain: bool,
    ) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.log
            .lock()
            .unwrap()
            .publishes
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::SeqCst)
    }
}

/// Network view scripted by the test
#[derive(Clone)]
pub struct MockNetwork {
    joined: Arc<AtomicBool>,
    address: NodeAddress,
    route: Option<IpAddr>,
}

impl MockNetwork {
    pub fn new(address: NodeAddress) -> Self {
        Self {
            joined: Arc::new(AtomicBool::new(true)),
            address,
            route: None,
        }
    }

    pub fn with_route(mut self, route: IpAddr) -> Self {
        self.route = Some(route);
        self
    }

    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::SeqCst);
    }

    pub fn handle(&self) -> Self {
        self.clone()
    }
}

impl NetworkInfo for MockNetwork {
    fn link_address(&self) -> NodeAddress {
        self.address
    }

    fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    fn default_route(&self) -> Option<IpAddr> {
        self.route
    }
}

/// Indicator that counts pulses
#[derive(Clone, Default)]
pub struct CountingIndicator {
    pulses: Arc<AtomicUsize>,
    lit: Arc<AtomicBool>,
}

impl CountingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn pulses(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }

    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::SeqCst)
    }
}

impl StatusIndicator for CountingIndicator {
    fn on(&mut self) {
        self.lit.store(true, Ordering::SeqCst);
    }

    fn off(&mut self) {
        self.lit.store(false, Ordering::SeqCst);
    }

    fn pulse(&mut self, _duration: Duration) {
        self.pulses.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sensor source returning a fixed reading
#[derive(Debug, Clone, Copy)]
pub struct FixedSensors {
    pub sample: SensorSample,
}

impl FixedSensors {
    pub fn new(temperature_c: f32, humidity: f32) -> Self {
        Self {
            sample: SensorSample {
                temperature_c,
                humidity,
            },
        }
    }
}

impl SensorSource for FixedSensors {
    fn sample(&mut self) -> SensorSample {
        self.sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_client_records_sends() {
        let client = ScriptedClient::new();
        let mut owned = client.handle();

        owned.register("d:test").unwrap();
        owned
            .publish("mote/cfg/announce", b"hello", QoS::AtMostOnce, false)
            .unwrap();

        assert_eq!(client.registrations(), vec!["d:test".to_string()]);
        assert_eq!(client.publishes().len(), 1);
        assert_eq!(client.publishes()[0].1, b"hello".to_vec());
    }

    #[test]
    fn test_scripted_client_single_shot_failure() {
        let client = ScriptedClient::new();
        let mut owned = client.handle();
        client.fail_next_send(TransportError::QueueFull);

        assert!(owned
            .publish("t", b"x", QoS::AtMostOnce, false)
            .is_err());
        assert!(owned.publish("t", b"x", QoS::AtMostOnce, false).is_ok());
        assert_eq!(client.publishes().len(), 1);
    }

    #[test]
    fn test_mock_network_toggles_join_state() {
        let network = MockNetwork::new([0; 8]);
        assert!(network.is_joined());
        network.set_joined(false);
        assert!(!network.is_joined());
    }
}
