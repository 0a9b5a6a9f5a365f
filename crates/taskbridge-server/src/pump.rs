//! Engine event pump: drains the engine's broadcast channel into the router.

use metrics::counter;
use taskbridge_core::engine::EngineEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::metrics::BRIDGE_EVENTS_DROPPED_TOTAL;
use crate::router::BridgeService;

/// Feed every engine event to [`BridgeService::ingest_event`] until the
/// engine closes its channel or `cancel` fires.
#[instrument(skip_all, name = "event_pump")]
pub async fn run_event_pump(
    service: BridgeService,
    mut rx: broadcast::Receiver<EngineEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => {
                debug!("event pump cancelled");
                break;
            }
            event = rx.recv() => event,
        };
        match event {
            Ok(event) => service.ingest_event(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                counter!(BRIDGE_EVENTS_DROPPED_TOTAL).increment(n);
                warn!(lagged = n, "event pump lagged, engine events lost");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("engine event channel closed, exiting");
                break;
            }
        }
    }
}
