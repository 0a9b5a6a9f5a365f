//! Network-facing server settings.

use serde::{Deserialize, Serialize};

/// HTTP and WebSocket listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Maximum concurrent transport streams.
    pub max_connections: usize,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Shared secret for `/status`, `/metrics` and upgrades.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,
    /// Seconds without a pong before a stream is considered dead.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9847,
            max_connections: 64,
            max_message_size: 16 * 1024 * 1024,
            api_key: None,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}
