//! Identity and topic construction
//!
//! Derives the broker-facing client identifier and the three topic strings
//! from the client configuration and the node link address. Every builder
//! formats into a fresh fixed-capacity buffer and reports [`Overflow`] when
//! the result would not fit, leaving previously built strings untouched.

use crate::config::ClientConfig;
use crate::net::NodeAddress;
use crate::protocol::Overflow;
use core::fmt::Write;

/// Capacity of every identity and topic buffer, in bytes
pub const IDENTITY_CAPACITY: usize = 64;

/// Fixed-capacity identity/topic string
pub type IdentityBuffer = heapless::String<IDENTITY_CAPACITY>;

/// Topic the configuration announcement is published to
pub const CONFIG_ANNOUNCE_TOPIC: &str = "mote/cfg/announce";

const OVERRIDE_TOPIC_PREFIX: &str = "mote/cfg";
const LOCATION_TOPIC_PREFIX: &str = "mote/loc";

fn overflow(_: core::fmt::Error) -> Overflow {
    Overflow {
        capacity: IDENTITY_CAPACITY,
    }
}

/// Build the full client identifier: `d:{org}:{type}:{address}`
///
/// Six of the eight link-address bytes are used; indexes 3 and 4 are the
/// EUI-64 padding pair and carry no device information.
pub fn build_client_id(
    config: &ClientConfig,
    address: &NodeAddress,
) -> Result<IdentityBuffer, Overflow> {
    let mut buffer = IdentityBuffer::new();
    write!(
        buffer,
        "d:{}:{}:{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        config.org_id,
        config.type_id,
        address[0],
        address[1],
        address[2],
        address[5],
        address[6],
        address[7],
    )
    .map_err(overflow)?;
    Ok(buffer)
}

/// Build the short client identifier used for topic scoping:
/// `{org}-{last two address bytes}`
pub fn build_short_id(
    config: &ClientConfig,
    address: &NodeAddress,
) -> Result<IdentityBuffer, Overflow> {
    let mut buffer = IdentityBuffer::new();
    write!(
        buffer,
        "{}-{:02x}{:02x}",
        config.org_id, address[6], address[7]
    )
    .map_err(overflow)?;
    Ok(buffer)
}

/// Build the override subscription topic:
/// `mote/cfg/{short_id}/{command_filter}`
pub fn build_subscribe_topic(
    config: &ClientConfig,
    short_id: &str,
) -> Result<IdentityBuffer, Overflow> {
    let mut buffer = IdentityBuffer::new();
    write!(
        buffer,
        "{OVERRIDE_TOPIC_PREFIX}/{short_id}/{}",
        config.command_filter
    )
    .map_err(overflow)?;
    Ok(buffer)
}

/// Build the configuration-announcement publish topic
pub fn build_config_publish_topic() -> Result<IdentityBuffer, Overflow> {
    let mut buffer = IdentityBuffer::new();
    write!(buffer, "{CONFIG_ANNOUNCE_TOPIC}").map_err(overflow)?;
    Ok(buffer)
}

/// Build the steady-state publish topic for a location override:
/// `mote/loc/{location}`
pub fn build_location_publish_topic(location: &str) -> Result<IdentityBuffer, Overflow> {
    let mut buffer = IdentityBuffer::new();
    write!(buffer, "{LOCATION_TOPIC_PREFIX}/{location}").map_err(overflow)?;
    Ok(buffer)
}

/// The derived identity set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub client_id: IdentityBuffer,
    pub short_id: IdentityBuffer,
    pub publish_topic: IdentityBuffer,
    pub subscribe_topic: IdentityBuffer,
}

impl Identity {
    /// Derive the configuration-phase identity set. The publish topic starts
    /// out pointing at the announcement topic; [`Identity::retarget`] swaps
    /// it once a location override arrives.
    pub fn build(config: &ClientConfig, address: &NodeAddress) -> Result<Self, Overflow> {
        let client_id = build_client_id(config, address)?;
        let short_id = build_short_id(config, address)?;
        let subscribe_topic = build_subscribe_topic(config, short_id.as_str())?;
        let publish_topic = build_config_publish_topic()?;
        Ok(Self {
            client_id,
            short_id,
            publish_topic,
            subscribe_topic,
        })
    }

    /// Point the publish topic at a location override. On overflow the
    /// previous topic remains in place.
    pub fn retarget(&mut self, location: &str) -> Result<(), Overflow> {
        let topic = build_location_publish_topic(location)?;
        self.publish_topic = topic;
        Ok(())
    }
}
