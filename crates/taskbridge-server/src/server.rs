//! `BridgeServer`: the axum HTTP surface and both upgrade endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use taskbridge_core::ClientId;
use taskbridge_core::engine::{EditorHost, TaskEngine};
use taskbridge_protocol::errors::UNAUTHENTICATED;
use taskbridge_settings::TaskbridgeSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{BridgeConfig, ServerConfig};
use crate::health::{self, HealthResponse, StatusResponse};
use crate::pump::run_event_pump;
use crate::resync::run_resync;
use crate::router::BridgeService;
use crate::shutdown::ShutdownCoordinator;
use crate::transport::connection::Flavor;
use crate::transport::session::{SessionParams, run_session};
use crate::transport::{UpgradeQuery, authorized, client_id_from};

/// Listener failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The router.
    pub service: BridgeService,
    /// Listener and transport configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: ShutdownCoordinator,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The bridge server.
pub struct BridgeServer {
    config: ServerConfig,
    service: BridgeService,
    shutdown: ShutdownCoordinator,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

/// A server accepting connections.
#[derive(Debug)]
pub struct RunningServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// Shutdown coordinator shared with every stream.
    pub shutdown: ShutdownCoordinator,
    handles: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Stop accepting, close every stream and wait for background tasks.
    pub async fn stop(self, timeout: Option<Duration>) {
        self.shutdown.graceful_shutdown(self.handles, timeout).await;
        info!("server stopped");
    }
}

impl BridgeServer {
    /// Create a server fronting `engine`.
    pub fn new(
        settings: &TaskbridgeSettings,
        engine: Arc<dyn TaskEngine>,
        host: Arc<dyn EditorHost>,
    ) -> Self {
        Self {
            config: ServerConfig::from_settings(settings),
            service: BridgeService::new(engine, host, BridgeConfig::from_settings(settings)),
            shutdown: ShutdownCoordinator::new(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this recorder handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// The router.
    pub fn service(&self) -> &BridgeService {
        &self.service
    }

    /// Listener configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: self.service.clone(),
            config: Arc::new(self.config.clone()),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(socket_upgrade))
            .route("/control", get(control_upgrade))
            .fallback(not_found)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind, then serve HTTP, the engine event pump and the resync loop in
    /// background tasks.
    pub async fn listen(self) -> Result<RunningServer, ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local = listener.local_addr()?;
        let token = self.shutdown.token();

        let mut handles = Vec::new();
        handles.push(tokio::spawn(run_event_pump(
            self.service.clone(),
            self.service.engine().subscribe(),
            token.clone(),
        )));
        if let Some(interval) = self.service.config().resync_interval {
            handles.push(tokio::spawn(run_resync(self.service.clone(), interval, token.clone())));
        }

        let app = self.router();
        let serve_token = token.clone();
        handles.push(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_token.cancelled().await })
                .await;
            if let Err(error) = result {
                error!(%error, "http server failed");
            }
        }));

        info!(addr = %local, "taskbridge server listening");
        Ok(RunningServer {
            addr: local,
            shutdown: self.shutdown,
            handles,
        })
    }
}

fn json_error(status: StatusCode, message: &str, code: Option<&str>) -> Response {
    let body = match code {
        Some(code) => json!({ "error": message, "code": code }),
        None => json!({ "error": message }),
    };
    (status, Json(body)).into_response()
}

fn unauthorized() -> Response {
    json_error(StatusCode::UNAUTHORIZED, "missing or invalid API key", Some(UNAUTHENTICATED))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.stats();
    Json(health::health_check(state.start_time, stats.connections, stats.bound_tasks))
}

/// GET /status
async fn status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, Response> {
    if !authorized(state.config.api_key.as_deref(), &headers, None) {
        return Err(unauthorized());
    }
    let version = &state.service.config().server_version;
    Ok(Json(health::status_report(state.start_time, state.service.stats(), version)))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(state.config.api_key.as_deref(), &headers, None) {
        return unauthorized();
    }
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => json_error(StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed", None),
    }
}

/// Shared upgrade checks. Returns the rejection, if any.
fn admit(state: &AppState, headers: &HeaderMap, query: &UpgradeQuery) -> Option<Response> {
    if !authorized(state.config.api_key.as_deref(), headers, query.api_key.as_deref()) {
        warn!("upgrade rejected: bad API key");
        return Some(unauthorized());
    }
    let open = state.service.connection_count();
    if open >= state.config.max_connections {
        warn!(open, max = state.config.max_connections, "upgrade rejected: connection limit");
        return Some(json_error(StatusCode::SERVICE_UNAVAILABLE, "too many connections", None));
    }
    None
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, client_id: ClientId, flavor: Flavor) -> Response {
    let params = SessionParams {
        client_id,
        flavor,
        ping_interval: state.config.ping_interval,
        pong_timeout: state.config.pong_timeout,
        queue_capacity: state.service.config().client_queue_capacity,
        shutdown: state.shutdown.token(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_session(socket, state.service, params))
}

/// GET /ws
async fn socket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<UpgradeQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Some(rejection) = admit(&state, &headers, &query) {
        return rejection;
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let client_id = query
        .client_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .map_or_else(ClientId::new, ClientId::from);
    upgrade(ws, state, client_id, Flavor::Socket)
}

/// GET /control
async fn control_upgrade(
    State(state): State<AppState>,
    Query(query): Query<UpgradeQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Some(rejection) = admit(&state, &headers, &query) {
        return rejection;
    }
    let Some(client_id) = client_id_from(&headers, &query) else {
        return json_error(
            StatusCode::UNAUTHORIZED,
            "x-client-id is required",
            Some(UNAUTHENTICATED),
        );
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    upgrade(ws, state, ClientId::from(client_id), Flavor::Control)
}

async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found", None)
}
