//! Bridge behavior settings.

use serde::{Deserialize, Serialize};

/// Router, reconciler and dispatcher tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Seconds between periodic state resyncs. `0` disables them.
    pub resync_interval_secs: u64,
    /// Upper bound on a single command, in seconds.
    pub command_timeout_secs: u64,
    /// Upper bound on an editor focus call, in milliseconds.
    pub focus_timeout_ms: u64,
    /// Outbound queue depth per transport stream.
    pub client_queue_capacity: usize,
    /// Version reported to clients on connect.
    pub server_version: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            resync_interval_secs: 30,
            command_timeout_secs: 60,
            focus_timeout_ms: 2000,
            client_queue_capacity: 1024,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
