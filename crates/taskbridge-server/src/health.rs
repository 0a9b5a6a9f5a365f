//! `/health` and `/status` bodies.

use std::time::Instant;

use serde::Serialize;

/// `/health` body. Never gated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Open client streams.
    pub connections: usize,
    /// Clients currently bound to a task.
    pub bound_tasks: usize,
    /// Seconds since boot.
    pub uptime_secs: u64,
}

/// Router counters, as reported on `/status`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Engine message events ingested.
    pub messages_received: u64,
    /// Reconciled messages published.
    pub messages_sent: u64,
    /// Commands that failed.
    pub errors: u64,
    /// Open client streams.
    pub connections: usize,
    /// Clients currently bound to a task.
    pub bound_tasks: usize,
    /// Open reconciliation buffers.
    pub open_buffers: usize,
}

/// `/status` body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Engine message events ingested.
    pub messages_received: u64,
    /// Reconciled messages published.
    pub messages_sent: u64,
    /// Commands that failed.
    pub errors: u64,
    /// Open client streams.
    pub connections: usize,
    /// Clients currently bound to a task.
    pub bound_tasks: usize,
    /// Open reconciliation buffers.
    pub open_buffers: usize,
    /// Seconds since boot.
    pub uptime_secs: u64,
    /// Server version.
    pub version: String,
}

/// Build the `/health` body.
pub fn health_check(start_time: Instant, connections: usize, bound_tasks: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        connections,
        bound_tasks,
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

/// Build the `/status` body.
pub fn status_report(start_time: Instant, stats: BridgeStats, version: &str) -> StatusResponse {
    StatusResponse {
        messages_received: stats.messages_received,
        messages_sent: stats.messages_sent,
        errors: stats.errors,
        connections: stats.connections,
        bound_tasks: stats.bound_tasks,
        open_buffers: stats.open_buffers,
        uptime_secs: start_time.elapsed().as_secs(),
        version: version.to_owned(),
    }
}
