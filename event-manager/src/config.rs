//! Subscription manager configuration

use std::net::IpAddr;
use std::time::Duration;

use soap_client::{TransportConfig, DEFAULT_SUBSCRIPTION_TIMEOUT_SECONDS};

/// Configuration for a [`SubscribeManager`](crate::SubscribeManager)
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Inclusive port range the callback listener binds in; `(0, 0)` picks an
    /// ephemeral port
    pub callback_port_range: (u16, u16),

    /// How often the renewal worker looks at the store; see
    /// [`renewal_window`](Self::renewal_window)
    pub renewal_check_interval: Duration,

    /// Timeout assumed when a device grants `infinite` or an unreadable value
    pub default_timeout_seconds: u32,

    /// How long a callback connection may take to deliver its request
    pub listener_read_timeout: Duration,

    /// Timeouts for SUBSCRIBE, renewal and UNSUBSCRIBE requests
    pub transport: TransportConfig,

    /// Address advertised in `CALLBACK` instead of the interface that routes
    /// to the device
    pub callback_host: Option<IpAddr>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            callback_port_range: (3400, 3500),
            renewal_check_interval: Duration::from_secs(10),
            default_timeout_seconds: DEFAULT_SUBSCRIPTION_TIMEOUT_SECONDS,
            listener_read_timeout: Duration::from_secs(5),
            transport: TransportConfig::default(),
            callback_host: None,
        }
    }
}

impl ManagerConfig {
    pub fn with_callback_port_range(mut self, start: u16, end: u16) -> Self {
        self.callback_port_range = (start, end);
        self
    }

    pub fn with_renewal_check_interval(mut self, interval: Duration) -> Self {
        self.renewal_check_interval = interval;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_callback_host(mut self, host: IpAddr) -> Self {
        self.callback_host = Some(host);
        self
    }

    /// Subscriptions expiring within this span of a check are renewed: one
    /// check interval plus the longest a renewal request may take.
    pub fn renewal_window(&self) -> Duration {
        self.renewal_check_interval + self.transport.connect_timeout + self.transport.read_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.callback_port_range, (3400, 3500));
        assert_eq!(config.renewal_check_interval, Duration::from_secs(10));
        assert_eq!(config.default_timeout_seconds, 300);
        assert_eq!(config.transport, TransportConfig::default());
        assert!(config.callback_host.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let host: IpAddr = "192.168.1.20".parse().unwrap();
        let config = ManagerConfig::default()
            .with_callback_port_range(0, 0)
            .with_renewal_check_interval(Duration::from_millis(100))
            .with_callback_host(host);

        assert_eq!(config.callback_port_range, (0, 0));
        assert_eq!(config.renewal_check_interval, Duration::from_millis(100));
        assert_eq!(config.callback_host, Some(host));
    }

    #[test]
    fn test_renewal_window_covers_request_time() {
        assert_eq!(ManagerConfig::default().renewal_window(), Duration::from_secs(25));

        let config = ManagerConfig::default()
            .with_renewal_check_interval(Duration::from_millis(100))
            .with_transport(TransportConfig {
                connect_timeout: Duration::from_millis(500),
                read_timeout: Duration::from_millis(500),
            });
        assert_eq!(config.renewal_window(), Duration::from_millis(1100));
    }
}
