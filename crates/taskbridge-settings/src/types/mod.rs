//! Settings type definitions.
//!
//! All types are camelCase on disk and carry `#[serde(default)]`, so a
//! settings file only needs the fields it overrides.

mod bridge;
mod logging;
mod server;

pub use bridge::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the taskbridge server.
///
/// ```json
/// { "server": { "port": 9900 }, "logging": { "format": "json" } }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskbridgeSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Bridge tuning.
    pub bridge: BridgeSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

fn invalid(message: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue(message.into())
}

impl TaskbridgeSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if server.max_connections == 0 {
            return Err(invalid("server.maxConnections must be at least 1"));
        }
        if server.max_message_size < 1024 {
            return Err(invalid("server.maxMessageSize must be at least 1024 bytes"));
        }
        if server.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("server.apiKey must not be empty when set"));
        }
        if server.ping_interval_secs == 0 {
            return Err(invalid("server.pingIntervalSecs must be at least 1"));
        }
        if server.pong_timeout_secs <= server.ping_interval_secs {
            return Err(invalid(
                "server.pongTimeoutSecs must exceed server.pingIntervalSecs",
            ));
        }

        let bridge = &self.bridge;
        if !(1..=3600).contains(&bridge.command_timeout_secs) {
            return Err(invalid("bridge.commandTimeoutSecs must be within 1..=3600"));
        }
        if bridge.focus_timeout_ms > 60_000 {
            return Err(invalid("bridge.focusTimeoutMs must not exceed 60000"));
        }
        if bridge.client_queue_capacity == 0 {
            return Err(invalid("bridge.clientQueueCapacity must be at least 1"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging.level must not be empty"));
        }
        Ok(())
    }
}
