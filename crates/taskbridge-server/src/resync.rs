//! Periodic state resync for state subscribers.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::router::BridgeService;

/// Push a fresh snapshot to state subscribers every `interval` until
/// `cancel` fires. A failed snapshot is logged and retried next tick.
#[instrument(skip_all, name = "state_resync", fields(interval_secs = interval.as_secs()))]
pub async fn run_resync(service: BridgeService, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    let _ = ticker.tick().await;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => match service.resync().await {
                Ok(0) => {}
                Ok(recipients) => debug!(recipients, "state resynced"),
                Err(error) => warn!(%error, "state resync failed"),
            },
        }
    }
}
