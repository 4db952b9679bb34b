//! Cooperative event loop driving the state machine
//!
//! One task owns the machine and reacts to exactly two things: the single
//! pending timer deadline (replaced by every tick, never duplicated) and the
//! transport's event channel. "Waiting" only ever means a scheduled future
//! tick; nothing here blocks.

use crate::error::{MoteError, MoteResult};
use crate::mote::lifecycle::{Mote, MoteState};
use crate::transport::{ClientEvent, ProtocolClient};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;
use tracing::info;

/// Event loop around a [`Mote`]
pub struct MoteRuntime<C>
where
    C: ProtocolClient,
{
    mote: Mote<C>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl<C> MoteRuntime<C>
where
    C: ProtocolClient,
{
    pub fn new(mote: Mote<C>, events: mpsc::UnboundedReceiver<ClientEvent>) -> Self {
        Self { mote, events }
    }

    /// Run until the machine reaches its terminal error state or the
    /// transport event channel closes
    pub async fn run(mut self) -> MoteResult<()> {
        // the very first tick fires immediately
        let mut deadline: Option<TokioInstant> = Some(TokioInstant::now());

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(TokioInstant::now)),
                    if deadline.is_some() =>
                {
                    deadline = self
                        .mote
                        .tick(Instant::now())
                        .map(|wake| TokioInstant::now() + wake);

                    if self.mote.state() == MoteState::Error {
                        return Err(MoteError::stopped("reconnect attempts exhausted"));
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            if self.mote.handle_event(event, Instant::now()) {
                                deadline = Some(TokioInstant::now());
                            }
                        }
                        None => {
                            info!("transport event channel closed; stopping");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mote::lifecycle::Timing;
    use crate::mote::retry::ReconnectPolicy;
    use crate::net::NodeAddress;
    use crate::testing::mocks::{CountingIndicator, FixedSensors, MockNetwork, ScriptedClient};
    use std::time::Duration;

    const ADDRESS: NodeAddress = [0x00, 0x12, 0x4b, 0x00, 0x0a, 0x50, 0x2e, 0x61];

    fn fast_timing() -> Timing {
        Timing {
            machine_poll: Duration::from_millis(5),
            net_check: Duration::from_millis(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_reaches_listening_and_announces() {
        let client = ScriptedClient::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mote = Mote::new(
            ClientConfig::default(),
            client.handle(),
            Box::new(MockNetwork::new(ADDRESS)),
            Box::new(CountingIndicator::new()),
            Box::new(FixedSensors::new(21.5, 61.25)),
        )
        .with_timing(fast_timing());

        let runtime = MoteRuntime::new(mote, rx);
        let handle = tokio::spawn(runtime.run());

        // let the machine register and initiate the connect
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.set_ready(true);
        tx.send(ClientEvent::Connected).unwrap();

        // subscribe happens on the next poll, the announcement one interval later
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(client.subscribes().len(), 1);
        assert_eq!(client.publishes().len(), 1);
        assert_eq!(client.publishes()[0].0, "mote/cfg/announce");

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_stops_when_attempts_exhausted() {
        let client = ScriptedClient::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let mote = Mote::new(
            ClientConfig::default(),
            client.handle(),
            Box::new(MockNetwork::new(ADDRESS)),
            Box::new(CountingIndicator::new()),
            Box::new(FixedSensors::new(21.5, 61.25)),
        )
        .with_timing(fast_timing())
        .with_policy(ReconnectPolicy {
            max_attempts: Some(0),
            ..ReconnectPolicy::default()
        });

        let runtime = MoteRuntime::new(mote, rx);
        let handle = tokio::spawn(runtime.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(ClientEvent::Disconnected {
            reason: "connection refused".to_string(),
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(MoteError::Stopped { .. })));
    }
}
