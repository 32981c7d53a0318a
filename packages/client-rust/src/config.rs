//! Client configuration types.

use std::time::Duration;

use crate::deadline::DEFAULT_TIMEOUT;

/// Client-level configuration for the execution core and the verb facade.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied to operations that do not specify one (or specify zero).
    pub default_timeout: Duration,
    /// Server-side timeout sent along with durable mutations.
    pub durability_timeout: Duration,
    /// Maximum number of in-flight operations before new ones are shed.
    pub max_concurrent_operations: u32,
    /// Collection identifier for requests; `None` addresses the default collection.
    pub collection_id: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            durability_timeout: Duration::from_millis(1500),
            max_concurrent_operations: 1024,
            collection_id: None,
        }
    }
}

/// Configuration for [`ChannelTransport`](crate::transport::ChannelTransport).
#[derive(Debug, Clone)]
pub struct ChannelTransportConfig {
    /// Bounded capacity of the outbound request channel.
    pub channel_capacity: usize,
    /// Maximum time to wait for room in the outbound channel.
    pub send_timeout: Duration,
}

impl Default for ChannelTransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            send_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.default_timeout, Duration::from_millis(2500));
        assert_eq!(config.durability_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_concurrent_operations, 1024);
        assert!(config.collection_id.is_none());
    }

    #[test]
    fn channel_transport_config_defaults() {
        let config = ChannelTransportConfig::default();
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }
}
