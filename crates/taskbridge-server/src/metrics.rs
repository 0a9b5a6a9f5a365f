//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before anything is recorded. The returned handle
/// renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Commands handled (counter, labels: command).
pub const BRIDGE_COMMANDS_TOTAL: &str = "bridge_commands_total";
/// Commands failed (counter, labels: command, kind).
pub const BRIDGE_COMMAND_ERRORS_TOTAL: &str = "bridge_command_errors_total";
/// Command duration (histogram, labels: command).
pub const BRIDGE_COMMAND_DURATION_SECONDS: &str = "bridge_command_duration_seconds";
/// Engine message events ingested (counter).
pub const BRIDGE_MESSAGES_RECEIVED_TOTAL: &str = "bridge_messages_received_total";
/// Reconciled messages published (counter).
pub const BRIDGE_MESSAGES_SENT_TOTAL: &str = "bridge_messages_sent_total";
/// Messages materialized by the reconciler (counter).
pub const BRIDGE_MESSAGES_RECONCILED_TOTAL: &str = "bridge_messages_reconciled_total";
/// Completions suppressed as already delivered (counter).
pub const BRIDGE_DUPLICATES_SUPPRESSED_TOTAL: &str = "bridge_duplicates_suppressed_total";
/// Outbound frames dropped on a full or closed queue (counter).
pub const BRIDGE_EVENTS_DROPPED_TOTAL: &str = "bridge_events_dropped_total";
/// Open reconciliation buffers (gauge).
pub const BRIDGE_OPEN_BUFFERS: &str = "bridge_open_buffers";
/// Streams opened (counter, labels: transport).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Streams closed (counter, labels: transport).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open streams (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Stream lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_recorder_renders() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            BRIDGE_COMMANDS_TOTAL,
            BRIDGE_COMMAND_ERRORS_TOTAL,
            BRIDGE_COMMAND_DURATION_SECONDS,
            BRIDGE_MESSAGES_RECEIVED_TOTAL,
            BRIDGE_MESSAGES_SENT_TOTAL,
            BRIDGE_MESSAGES_RECONCILED_TOTAL,
            BRIDGE_DUPLICATES_SUPPRESSED_TOTAL,
            BRIDGE_EVENTS_DROPPED_TOTAL,
            BRIDGE_OPEN_BUFFERS,
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
