//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every struct is `#[serde(default)]`, so a
//! partial file only needs the keys it changes.

use mmbridge_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Port the bridge listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3333;

/// Root settings type.
///
/// ```json
/// { "server": { "port": 4444 }, "logging": { "level": "debug" } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Listener and connection settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Listener and connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address. Must be a loopback address or `localhost`.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Seconds between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a connection is closed.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted WebSocket frame in bytes.
    pub max_message_size: usize,
    /// Drop unanswered signer requests after this many seconds.
    ///
    /// `None` keeps them until answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_request_ttl_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 16 * 1024 * 1024,
            pending_request_ttl_secs: None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
