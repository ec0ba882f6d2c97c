//! WebSocket types and configuration

use std::time::Duration;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Bound on each individual connection attempt
    pub connect_timeout: Duration,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before giving up (0 = retry forever)
    pub max_failures: u32,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(2),
            max_failures: 10,
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the per-attempt connection timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Set the fixed reconnection delay
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set the consecutive-failure budget
    pub fn max_failures(mut self, n: u32) -> Self {
        self.max_failures = n;
        self
    }

    /// Set the ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }
}

/// Events delivered to the consumer of a WebSocket connection
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Connection established (also after a reconnect)
    Connected,
    /// Text frame received
    Text(String),
    /// Binary frame received
    Binary(Vec<u8>),
    /// Connection lost, a reconnect attempt is scheduled
    Reconnecting { attempt: u32 },
    /// Consecutive-failure budget exhausted; the client stops retrying
    Exhausted,
}

/// WebSocket errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum WsError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("connection attempt timed out")]
    ConnectTimeout,
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.max_failures, 10);
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_ws_config_builder() {
        let config = WsConfig::new("wss://example.com")
            .max_failures(3)
            .reconnect_delay(Duration::from_millis(500))
            .connect_timeout(Duration::from_secs(5))
            .ping_interval(Duration::from_secs(15));

        assert_eq!(config.url, "wss://example.com");
        assert_eq!(config.max_failures, 3);
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_ws_error_display() {
        let err = WsError::ConnectionFailed("timeout".to_string());
        assert_eq!(err.to_string(), "connection failed: timeout");
        assert_eq!(
            WsError::ConnectTimeout.to_string(),
            "connection attempt timed out"
        );
    }

    #[test]
    fn test_ws_event_variants() {
        let ev = WsEvent::Text("hello".to_string());
        assert!(matches!(ev, WsEvent::Text(_)));
        assert!(matches!(
            WsEvent::Reconnecting { attempt: 3 },
            WsEvent::Reconnecting { attempt: 3 }
        ));
        assert!(matches!(WsEvent::Exhausted, WsEvent::Exhausted));
    }
}
