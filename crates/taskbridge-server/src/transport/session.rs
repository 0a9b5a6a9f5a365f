//! Stream lifecycle shared by both transports: from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use taskbridge_core::ClientId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, Flavor};
use super::{control, socket};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::router::BridgeService;

/// Per-stream settings.
#[derive(Clone, Debug)]
pub struct SessionParams {
    /// Owning client.
    pub client_id: ClientId,
    /// Wire format.
    pub flavor: Flavor,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which the stream is considered dead.
    pub pong_timeout: Duration,
    /// Outbound queue bound.
    pub queue_capacity: usize,
    /// Server shutdown.
    pub shutdown: CancellationToken,
}

/// Run one client stream.
///
/// Sends the transport's greeting, registers the stream with the router,
/// then decodes inbound frames into commands while a writer task drains the
/// outbound queue and pings the client. On exit the stream is detached,
/// which aborts the client's task if this was its last stream.
#[instrument(skip_all, fields(client_id = %params.client_id, transport = params.flavor.as_str()))]
pub async fn run_session(ws: WebSocket, service: BridgeService, params: SessionParams) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let transport = params.flavor.as_str();

    if let Some(greeting) = greeting(&service, &params) {
        if ws_tx.send(Message::Text(greeting.into())).await.is_err() {
            debug!("client went away before greeting");
            return;
        }
    }

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(params.queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(
        params.client_id.clone(),
        params.flavor,
        send_tx,
    ));
    if let Err(error) = service.connect(Arc::clone(&connection)) {
        warn!(%error, "stream rejected");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL, "transport" => transport).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Cancelled when the writer stops, so the reader stops too.
    let closed = params.shutdown.child_token();

    let writer_conn = Arc::clone(&connection);
    let writer_closed = closed.clone();
    let shutdown = params.shutdown.clone();
    let (ping_interval, pong_timeout) = (params.ping_interval, params.pong_timeout);
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    let silent = writer_conn.last_pong_elapsed() > pong_timeout;
                    if !writer_conn.check_alive() && silent {
                        warn!(timeout = ?pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        writer_closed.cancel();
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = closed.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
        };
        connection.mark_alive();

        let replies = match params.flavor {
            Flavor::Socket => socket::handle_frame(&service, &params.client_id, &text).await,
            Flavor::Control => control::handle_frame(&service, &params.client_id, &text).await,
        };
        for reply in replies {
            if !connection.send(Arc::new(reply)) {
                info!("failed to enqueue reply (channel full or closed)");
            }
        }
    }

    counter!(WS_DISCONNECTIONS_TOTAL, "transport" => transport).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    outbound.abort();
    service.disconnect(&connection).await;
    info!(
        duration_secs = started.elapsed().as_secs(),
        dropped = connection.drop_count(),
        "stream closed"
    );
}

fn greeting(service: &BridgeService, params: &SessionParams) -> Option<String> {
    match params.flavor {
        Flavor::Socket => socket::greeting(&params.client_id, &service.config().server_version),
        Flavor::Control => None,
    }
}
