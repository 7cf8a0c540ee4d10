//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use mmbridge_settings::{DEFAULT_PORT, ServerSettings};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Configuration for the bridge server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind. Must be loopback (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `3333`, `0` to auto-assign).
    pub port: u16,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (close after this long without a pong).
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Expire unanswered signer requests after this many seconds.
    pub pending_request_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            pending_request_ttl_secs: None,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            max_message_size: settings.max_message_size,
            pending_request_ttl_secs: settings.pending_request_ttl_secs,
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address, refusing anything but loopback.
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host
                .parse::<IpAddr>()
                .map_err(|_| ServerError::InvalidHost(self.host.clone()))?
        };
        if !ip.is_loopback() {
            return Err(ServerError::NonLoopbackHost(self.host.clone()));
        }
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Time without a pong before a connection is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }

    /// Correlation expiry, if enabled.
    pub fn pending_request_ttl(&self) -> Option<Duration> {
        self.pending_request_ttl_secs.map(Duration::from_secs)
    }
}
