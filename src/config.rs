//! Client configuration store
//!
//! Holds the mutable mote configuration in fixed-capacity buffers. The store
//! is populated with compiled-in defaults at startup and may be partially or
//! fully overwritten through [`ClientConfig::apply_override`], the single
//! validated mutation path. The optional TOML overlay file is just another
//! client of that path.

use crate::net::NodeAddress;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Capacity of the organization id buffer, in bytes
pub const ORG_ID_CAPACITY: usize = 32;
/// Capacity of the type id buffer, in bytes
pub const TYPE_ID_CAPACITY: usize = 32;
/// Capacity of the auth token buffer, in bytes
pub const AUTH_TOKEN_CAPACITY: usize = 32;
/// Capacity of the broker host buffer, in bytes
pub const BROKER_HOST_CAPACITY: usize = 64;
/// Capacity of the command filter buffer, in bytes
pub const COMMAND_FILTER_CAPACITY: usize = 8;

const DEFAULT_ORG_ID: &str = "mtdssens";
const DEFAULT_TYPE_ID: &str = "native";
const DEFAULT_AUTH_TOKEN: &str = "AUTHZ";
const DEFAULT_BROKER_HOST: &str = "127.0.0.1";
const DEFAULT_BROKER_PORT: u16 = 1883;
const DEFAULT_COMMAND_FILTER: &str = "+";
const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);

/// Mutable mote configuration, single-owner, process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub org_id: heapless::String<ORG_ID_CAPACITY>,
    pub type_id: heapless::String<TYPE_ID_CAPACITY>,
    pub auth_token: heapless::String<AUTH_TOKEN_CAPACITY>,
    pub broker_host: heapless::String<BROKER_HOST_CAPACITY>,
    pub broker_port: u16,
    pub command_filter: heapless::String<COMMAND_FILTER_CAPACITY>,
    pub publish_interval: Duration,
}

/// Configuration fields addressable through the override path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    OrgId,
    TypeId,
    AuthToken,
    BrokerHost,
    BrokerPort,
    CommandFilter,
    PublishInterval,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("value for '{field}' is {length} bytes, capacity is {capacity}")]
    FieldTooLong {
        field: &'static str,
        length: usize,
        capacity: usize,
    },
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

fn literal<const N: usize>(value: &'static str) -> heapless::String<N> {
    let mut buffer = heapless::String::new();
    buffer
        .push_str(value)
        .expect("compiled-in default fits its buffer");
    buffer
}

/// Length-checked copy into a fixed-capacity buffer. The target is only
/// touched once the value is known to fit.
fn copy_bounded<const N: usize>(
    target: &mut heapless::String<N>,
    field: &'static str,
    value: &str,
) -> Result<(), ConfigError> {
    if value.len() > N {
        return Err(ConfigError::FieldTooLong {
            field,
            length: value.len(),
            capacity: N,
        });
    }
    target.clear();
    if target.push_str(value).is_err() {
        return Err(ConfigError::FieldTooLong {
            field,
            length: value.len(),
            capacity: N,
        });
    }
    Ok(())
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            org_id: literal(DEFAULT_ORG_ID),
            type_id: literal(DEFAULT_TYPE_ID),
            auth_token: literal(DEFAULT_AUTH_TOKEN),
            broker_host: literal(DEFAULT_BROKER_HOST),
            broker_port: DEFAULT_BROKER_PORT,
            command_filter: literal(DEFAULT_COMMAND_FILTER),
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Overwrite a single field after validating the value. A rejected value
    /// leaves the field exactly as it was.
    pub fn apply_override(&mut self, field: ConfigField, value: &str) -> Result<(), ConfigError> {
        match field {
            ConfigField::OrgId => copy_bounded(&mut self.org_id, "org_id", value),
            ConfigField::TypeId => copy_bounded(&mut self.type_id, "type_id", value),
            ConfigField::AuthToken => copy_bounded(&mut self.auth_token, "auth_token", value),
            ConfigField::BrokerHost => copy_bounded(&mut self.broker_host, "broker_host", value),
            ConfigField::CommandFilter => {
                copy_bounded(&mut self.command_filter, "command_filter", value)
            }
            ConfigField::BrokerPort => {
                let port: u16 = value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "broker_port",
                    message: format!("'{value}' is not a valid port number"),
                })?;
                if port == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "broker_port",
                        message: "port must be positive".to_string(),
                    });
                }
                self.broker_port = port;
                Ok(())
            }
            ConfigField::PublishInterval => {
                let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "publish_interval_secs",
                    message: format!("'{value}' is not a number of seconds"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "publish_interval_secs",
                        message: "interval must be positive".to_string(),
                    });
                }
                self.publish_interval = Duration::from_secs(secs);
                Ok(())
            }
        }
    }
}

/// Optional TOML overlay file
///
/// Every present value is routed through [`ClientConfig::apply_override`], so
/// overlay and runtime reconfiguration share one validation path.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub node: NodeSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ClientSection {
    pub org_id: Option<String>,
    pub type_id: Option<String>,
    pub auth_token: Option<String>,
    pub command_filter: Option<String>,
    pub publish_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BrokerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NodeSection {
    /// Node link address as 16 hex digits, ':'/'-' separators allowed
    pub link_address: Option<String>,
}

impl ConfigFile {
    /// Load an overlay file from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply every present value onto `config`
    pub fn apply_to(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        if let Some(value) = &self.client.org_id {
            config.apply_override(ConfigField::OrgId, value)?;
        }
        if let Some(value) = &self.client.type_id {
            config.apply_override(ConfigField::TypeId, value)?;
        }
        if let Some(value) = &self.client.auth_token {
            config.apply_override(ConfigField::AuthToken, value)?;
        }
        if let Some(value) = &self.client.command_filter {
            config.apply_override(ConfigField::CommandFilter, value)?;
        }
        if let Some(secs) = self.client.publish_interval_secs {
            config.apply_override(ConfigField::PublishInterval, &secs.to_string())?;
        }
        if let Some(host) = &self.broker.host {
            config.apply_override(ConfigField::BrokerHost, host)?;
        }
        if let Some(port) = self.broker.port {
            config.apply_override(ConfigField::BrokerPort, &port.to_string())?;
        }
        Ok(())
    }

    /// Node link address from the overlay, if present
    pub fn link_address(&self) -> Result<Option<NodeAddress>, ConfigError> {
        match &self.node.link_address {
            Some(text) => Ok(Some(parse_link_address(text)?)),
            None => Ok(None),
        }
    }
}

/// Parse a link address from 16 hex digits with optional separators
pub fn parse_link_address(text: &str) -> Result<NodeAddress, ConfigError> {
    let digits: String = text.chars().filter(|c| !matches!(c, ':' | '-')).collect();
    if digits.len() != 16 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidValue {
            field: "link_address",
            message: format!("'{text}' is not a 16-hex-digit link address"),
        });
    }
    let mut address: NodeAddress = [0; 8];
    for (index, byte) in address.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[2 * index..2 * index + 2], 16).map_err(|_| {
            ConfigError::InvalidValue {
                field: "link_address",
                message: format!("'{text}' is not a 16-hex-digit link address"),
            }
        })?;
    }
    Ok(address)
}
