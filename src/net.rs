//! Network collaborator interface
//!
//! The mote does not own a network stack; it only asks whether the node has
//! joined a network and which next hop telemetry will leave through. Both
//! questions go through [`NetworkInfo`] so the answers can come from a real
//! stack, a static configuration, or a test double.

use std::net::IpAddr;

/// Node-unique link address (EUI-64 style, eight bytes)
pub type NodeAddress = [u8; 8];

/// Link address used when the overlay file does not provide one
pub const DEFAULT_LINK_ADDRESS: NodeAddress = [0x00, 0x12, 0x4b, 0x00, 0x0a, 0x50, 0x2e, 0x61];

/// Read-only view of the node's network state
pub trait NetworkInfo: Send {
    /// Node-unique hardware address, stable for the process lifetime
    fn link_address(&self) -> NodeAddress;

    /// Whether the node holds a usable (global) address
    fn is_joined(&self) -> bool;

    /// Current default next hop, used as a best-effort routing hint
    fn default_route(&self) -> Option<IpAddr>;
}

/// Fixed network view for hosted deployments
///
/// A hosted mote is on a network the moment the process starts; the default
/// route hint points at whatever the deployment configured (usually the
/// broker itself).
#[derive(Debug, Clone)]
pub struct StaticNetwork {
    link_address: NodeAddress,
    route: Option<IpAddr>,
}

impl StaticNetwork {
    pub fn new(link_address: NodeAddress, route: Option<IpAddr>) -> Self {
        Self {
            link_address,
            route,
        }
    }
}

impl NetworkInfo for StaticNetwork {
    fn link_address(&self) -> NodeAddress {
        self.link_address
    }

    fn is_joined(&self) -> bool {
        true
    }

    fn default_route(&self) -> Option<IpAddr> {
        self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_network_is_always_joined() {
        let network = StaticNetwork::new(DEFAULT_LINK_ADDRESS, None);
        assert!(network.is_joined());
        assert_eq!(network.link_address(), DEFAULT_LINK_ADDRESS);
        assert_eq!(network.default_route(), None);
    }

    #[test]
    fn test_static_network_reports_route() {
        let route: IpAddr = "192.0.2.7".parse().unwrap();
        let network = StaticNetwork::new(DEFAULT_LINK_ADDRESS, Some(route));
        assert_eq!(network.default_route(), Some(route));
    }
}
