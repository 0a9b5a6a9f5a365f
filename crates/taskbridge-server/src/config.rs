//! Runtime configuration derived from [`TaskbridgeSettings`].

use std::time::Duration;

use taskbridge_settings::TaskbridgeSettings;

/// Listener and transport configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent streams across both transports.
    pub max_connections: usize,
    /// Maximum inbound frame size in bytes.
    pub max_message_size: usize,
    /// Required on `/status`, `/metrics` and upgrades when set.
    pub api_key: Option<String>,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which a stream is considered dead.
    pub pong_timeout: Duration,
}

/// Router and dispatcher tuning.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Upper bound for a single command, engine call included.
    pub command_timeout: Duration,
    /// Upper bound for editor host calls.
    pub focus_timeout: Duration,
    /// Heartbeat state resync period; `None` disables it.
    pub resync_interval: Option<Duration>,
    /// Outbound queue depth per stream.
    pub client_queue_capacity: usize,
    /// Version reported in greetings and `/status`.
    pub server_version: String,
}

impl ServerConfig {
    /// Take the `server` section.
    pub fn from_settings(settings: &TaskbridgeSettings) -> Self {
        let s = &settings.server;
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            max_message_size: s.max_message_size,
            api_key: s.api_key.clone(),
            ping_interval: Duration::from_secs(s.ping_interval_secs),
            pong_timeout: Duration::from_secs(s.pong_timeout_secs),
        }
    }

    /// `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut settings = TaskbridgeSettings::default();
        settings.server.port = 0;
        Self::from_settings(&settings)
    }
}

impl BridgeConfig {
    /// Take the `bridge` section.
    pub fn from_settings(settings: &TaskbridgeSettings) -> Self {
        let b = &settings.bridge;
        Self {
            command_timeout: Duration::from_secs(b.command_timeout_secs),
            focus_timeout: Duration::from_millis(b.focus_timeout_ms),
            resync_interval: (b.resync_interval_secs > 0)
                .then(|| Duration::from_secs(b.resync_interval_secs)),
            client_queue_capacity: b.client_queue_capacity,
            server_version: b.server_version.clone(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_settings(&TaskbridgeSettings::default())
    }
}
