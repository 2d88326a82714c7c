//! Endpoint configuration

use std::net::SocketAddr;

use crate::broker::DEFAULT_BROKER_PORT;
use crate::protocol::{ConnectRequest, DynamicTransformId};
use crate::types::ResourceType;

/// Default endpoint port
pub const DEFAULT_ENDPOINT_PORT: u16 = 8082;

/// Endpoint configuration options
///
/// `hostname` and `port` are the endpoint's advertised identity; together
/// with the group they decide whether a requested-key reuse is a reconnect
/// or a collision on the broker side.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Advertised hostname
    pub hostname: String,

    /// Advertised port
    pub port: u16,

    /// Broker address to register with
    pub broker_addr: SocketAddr,

    /// Replica group to join (absent = own fresh group)
    pub group_id: Option<String>,

    /// Specific key to register under (absent = broker-assigned)
    pub requested_key: Option<String>,

    /// Resource types this endpoint answers for
    pub supported_types: Vec<ResourceType>,

    /// Endpoint-defined transforms this endpoint implements
    pub dynamic_transforms: Vec<DynamicTransformId>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: DEFAULT_ENDPOINT_PORT,
            broker_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_BROKER_PORT)),
            group_id: None,
            requested_key: None,
            supported_types: Vec::new(),
            dynamic_transforms: Vec::new(),
        }
    }
}

impl EndpointConfig {
    /// Set the broker address
    pub fn broker(mut self, addr: SocketAddr) -> Self {
        self.broker_addr = addr;
        self
    }

    /// Set the advertised identity
    pub fn advertise(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.hostname = hostname.into();
        self.port = port;
        self
    }

    /// Join a replica group
    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Request a specific key
    pub fn requested_key(mut self, key: impl Into<String>) -> Self {
        self.requested_key = Some(key.into());
        self
    }

    /// Set the supported resource types
    pub fn supported_types(mut self, types: Vec<ResourceType>) -> Self {
        self.supported_types = types;
        self
    }

    /// Set the advertised dynamic transforms
    pub fn dynamic_transforms(mut self, transforms: Vec<DynamicTransformId>) -> Self {
        self.dynamic_transforms = transforms;
        self
    }

    /// Build the registration request this configuration advertises
    pub fn connect_request(&self) -> ConnectRequest {
        ConnectRequest {
            hostname: self.hostname.clone(),
            port: self.port,
            group_id: self.group_id.clone(),
            requested_key: self.requested_key.clone(),
            supported_types: self.supported_types.clone(),
            dynamic_transforms: self.dynamic_transforms.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();

        assert_eq!(config.port, DEFAULT_ENDPOINT_PORT);
        assert_eq!(config.broker_addr.port(), DEFAULT_BROKER_PORT);
        assert!(config.group_id.is_none());
        assert!(config.requested_key.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = EndpointConfig::default()
            .advertise("lib1.example", 9001)
            .group("replicas")
            .requested_key("mykey001")
            .supported_types(vec![ResourceType::Page]);

        let req = config.connect_request();
        assert_eq!(req.hostname, "lib1.example");
        assert_eq!(req.port, 9001);
        assert_eq!(req.group_id.as_deref(), Some("replicas"));
        assert_eq!(req.requested_key.as_deref(), Some("mykey001"));
        assert_eq!(req.supported_types, [ResourceType::Page]);
    }
}
