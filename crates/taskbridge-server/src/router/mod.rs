//! Session & Command Router.
//!
//! [`BridgeService`] is the single coordinating service both transports talk
//! to. It owns the client registry, the task bindings, the reconciler and the
//! subscription registry (all inside one [`BridgeState`]), and it is the only
//! component that calls the task engine.
//!
//! Inbound, transports call [`BridgeService::handle_command`]. Outbound, the
//! engine event pump calls [`BridgeService::ingest_event`], and reconciled
//! messages are published through the dispatcher.

mod commands;
pub mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use taskbridge_core::engine::{EditorHost, EngineEvent, TaskEngine, TaskHandle};
use taskbridge_core::errors::ENGINE_ERROR;
use taskbridge_core::message::{EngineMessage, SayType};
use taskbridge_core::{BridgeError, ClientId, TaskId};
use taskbridge_protocol::errors::ErrorBody;
use taskbridge_protocol::translate::{state_to_wire, to_wire};
use taskbridge_protocol::wire::WireState;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::dispatch::{Audience, OutboundEvent, deliver};
use crate::health::BridgeStats;
use crate::metrics::{
    BRIDGE_DUPLICATES_SUPPRESSED_TOTAL, BRIDGE_MESSAGES_RECEIVED_TOTAL,
    BRIDGE_MESSAGES_RECONCILED_TOTAL, BRIDGE_MESSAGES_SENT_TOTAL, BRIDGE_OPEN_BUFFERS,
};
use crate::reconcile::Ingest;
use crate::transport::connection::ClientConnection;

use state::{BindOutcome, BridgeState};

/// Successful command outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandReply {
    /// Applied; nothing to return.
    Ack,
    /// A new task was created and bound.
    TaskStarted {
        /// The new task.
        task_id: TaskId,
        /// Engine version.
        version: String,
    },
    /// The latest task was resumed and bound.
    TaskResumed {
        /// The resumed task.
        task_id: TaskId,
        /// Engine version.
        version: String,
    },
    /// Full engine state.
    State(Box<WireState>),
    /// Whether the bound task has uncommitted workspace changes.
    Changes {
        /// Answer from the engine.
        has_changes: bool,
    },
}

#[derive(Default)]
struct Counters {
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    errors: AtomicU64,
}

struct Inner {
    engine: Arc<dyn TaskEngine>,
    host: Arc<dyn EditorHost>,
    config: BridgeConfig,
    state: Mutex<BridgeState>,
    counters: Counters,
}

/// Cheaply cloneable handle to the router.
#[derive(Clone)]
pub struct BridgeService {
    inner: Arc<Inner>,
}

impl BridgeService {
    /// Create a router in front of `engine`.
    pub fn new(
        engine: Arc<dyn TaskEngine>,
        host: Arc<dyn EditorHost>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                host,
                config,
                state: Mutex::new(BridgeState::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// Router configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The fronted engine.
    pub fn engine(&self) -> &Arc<dyn TaskEngine> {
        &self.inner.engine
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// Register a stream for its client.
    pub fn connect(&self, connection: Arc<ClientConnection>) -> Result<(), BridgeError> {
        if connection.client_id.as_str().is_empty() {
            return Err(BridgeError::validation("clientId is required"));
        }
        let client_id = connection.client_id.clone();
        let flavor = connection.flavor.as_str();
        let streams = self.inner.state.lock().attach(connection);
        info!(%client_id, transport = flavor, streams, "client stream attached");
        Ok(())
    }

    /// Detach a stream. When it was the client's last stream, the session
    /// closes and its bound task is aborted.
    pub async fn disconnect(&self, connection: &ClientConnection) {
        let client_id = &connection.client_id;
        let detached = {
            let mut state = self.inner.state.lock();
            let detached = state.detach(client_id, &connection.id);
            record_open_buffers(&state);
            detached
        };
        if !detached.session_closed {
            debug!(%client_id, connection_id = %connection.id, "client stream detached");
            return;
        }
        match detached.released_task {
            Some(task_id) => {
                info!(%client_id, %task_id, "client disconnected, aborting bound task");
                self.abort_task(&task_id).await;
            }
            None => info!(%client_id, "client disconnected"),
        }
    }

    fn detach_closed(&self, connections: Vec<Arc<ClientConnection>>) {
        for connection in connections {
            let service = self.clone();
            let _ = tokio::spawn(async move { service.disconnect(&connection).await });
        }
    }

    // ── Bindings ────────────────────────────────────────────────────

    /// Bind a freshly obtained task handle and watch for its disposal.
    fn bind(&self, client_id: &ClientId, handle: &TaskHandle) -> BindOutcome {
        let (release, displaced) = match self.inner.state.lock().bind(client_id, &handle.id) {
            BindOutcome::Bound { release, displaced } => (release, displaced),
            rejected => return rejected,
        };
        info!(%client_id, task_id = %handle.id, "task bound");

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let disposed = handle.disposed();
        let task_id = handle.id.clone();
        let watch = release.clone();
        let _ = tokio::spawn(async move {
            tokio::select! {
                () = disposed.cancelled() => {
                    if let Some(inner) = weak.upgrade() {
                        BridgeService { inner }.on_disposed(&task_id);
                    }
                }
                () = watch.cancelled() => {}
            }
        });
        BindOutcome::Bound { release, displaced }
    }

    /// Release the client's binding. Returns the released task.
    fn release(&self, client_id: &ClientId) -> Option<TaskId> {
        let mut state = self.inner.state.lock();
        let released = state.unbind(client_id);
        record_open_buffers(&state);
        if let Some(task_id) = &released {
            info!(%client_id, %task_id, "task binding released");
        }
        released
    }

    /// The engine disposed a task: drop whatever binding still points at it.
    pub fn on_disposed(&self, task_id: &TaskId) {
        let mut state = self.inner.state.lock();
        if let Some(client_id) = state.unbind_task(task_id) {
            info!(%client_id, %task_id, "task disposed, binding released");
        }
        record_open_buffers(&state);
    }

    async fn abort_task(&self, task_id: &TaskId) {
        if let Err(error) = self.inner.engine.cancel_task(task_id).await {
            warn!(%task_id, %error, "failed to abort released task");
        }
    }

    async fn focus_host(&self) {
        match tokio::time::timeout(self.inner.config.focus_timeout, self.inner.host.focus()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "editor host focus failed"),
            Err(_) => warn!(
                timeout = ?self.inner.config.focus_timeout,
                "editor host focus timed out"
            ),
        }
    }

    // ── Engine events ───────────────────────────────────────────────

    /// Feed one engine event through reconciliation and dispatch.
    pub fn ingest_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Message { task_id, message } => {
                counter!(BRIDGE_MESSAGES_RECEIVED_TOTAL).increment(1);
                let _ = self.inner.counters.messages_received.fetch_add(1, Ordering::Relaxed);
                let outcome = {
                    let mut state = self.inner.state.lock();
                    let Some(owner) = state.owner(&task_id).cloned() else {
                        debug!(%task_id, ts = ?message.ts, "message for unbound task dropped");
                        return;
                    };
                    let outcome = state.reconciler.ingest(&owner, &task_id, &message);
                    record_open_buffers(&state);
                    outcome
                };
                match outcome {
                    Ingest::Emitted(message) => self.emit_reconciled(&task_id, vec![message]),
                    Ingest::Duplicate => counter!(BRIDGE_DUPLICATES_SUPPRESSED_TOTAL).increment(1),
                    Ingest::Pending | Ingest::Dropped => {}
                }
            }
            EngineEvent::State { task_id, state } => {
                let owner = task_id
                    .as_ref()
                    .and_then(|t| self.inner.state.lock().owner(t).cloned());
                let audience = owner.clone().map_or(Audience::All, Audience::Client);
                let _ = self.publish(
                    OutboundEvent::State {
                        task_id: task_id.clone(),
                        state: Box::new(state_to_wire(&state)),
                    },
                    audience,
                );
                if let (Some(task_id), Some(_)) = (task_id, owner) {
                    self.replay(&task_id, &state.messages);
                }
            }
            EngineEvent::Disposed { task_id } => self.on_disposed(&task_id),
        }
    }

    /// Feed a snapshot's complete messages through the reconciler as
    /// single-chunk events. Already-delivered timestamps are suppressed.
    fn replay(&self, task_id: &TaskId, messages: &[EngineMessage]) {
        let emitted = {
            let mut state = self.inner.state.lock();
            let Some(owner) = state.owner(task_id).cloned() else {
                return;
            };
            let mut emitted = Vec::new();
            let mut duplicates = 0_u64;
            for message in messages.iter().filter(|m| !m.is_partial()) {
                match state.reconciler.ingest(&owner, task_id, message) {
                    Ingest::Emitted(m) => emitted.push(m),
                    Ingest::Duplicate => duplicates += 1,
                    Ingest::Pending | Ingest::Dropped => {}
                }
            }
            counter!(BRIDGE_DUPLICATES_SUPPRESSED_TOTAL).increment(duplicates);
            emitted
        };
        debug!(%task_id, replayed = emitted.len(), "snapshot replayed");
        self.emit_reconciled(task_id, emitted);
    }

    fn emit_reconciled(&self, task_id: &TaskId, messages: Vec<EngineMessage>) {
        for message in messages {
            counter!(BRIDGE_MESSAGES_RECONCILED_TOTAL).increment(1);
            let Some(wire) = to_wire(&message) else { continue };
            let _ = self.publish(
                OutboundEvent::Message {
                    task_id: task_id.clone(),
                    message: Box::new(wire),
                },
                Audience::Task(task_id.clone()),
            );
            counter!(BRIDGE_MESSAGES_SENT_TOTAL).increment(1);
            let _ = self.inner.counters.messages_sent.fetch_add(1, Ordering::Relaxed);

            if message.say_type() == Some(SayType::Error) {
                let body = ErrorBody::new(ENGINE_ERROR, message.text_or_empty(), "task_error");
                let _ = self.publish(
                    OutboundEvent::Error {
                        task_id: Some(task_id.clone()),
                        body,
                    },
                    Audience::Task(task_id.clone()),
                );
            }
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Deliver an event to its audience. Returns the clients it reached.
    pub fn publish(&self, event: OutboundEvent, audience: Audience) -> Vec<ClientId> {
        let targets = {
            let state = self.inner.state.lock();
            state.dispatcher.select(&audience, event.event_type(), state.views())
        };
        if targets.connections.is_empty() {
            debug!(event_type = event.event_type(), ?audience, "event has no recipients");
            return targets.clients;
        }
        let report = deliver(&event, &targets.connections);
        self.detach_closed(report.closed);
        targets.clients
    }

    /// Heartbeat: one snapshot, delivered to state subscribers only.
    pub async fn resync(&self) -> Result<usize, BridgeError> {
        let has_subscribers = {
            let state = self.inner.state.lock();
            state
                .views()
                .any(|s| state.dispatcher.subscriptions().wants_state(s.client_id))
        };
        if !has_subscribers {
            return Ok(0);
        }
        let snapshot = self.inner.engine.state_snapshot().await?;
        let event = OutboundEvent::State {
            task_id: snapshot.current_task.as_ref().map(|t| t.id.clone()),
            state: Box::new(state_to_wire(&snapshot)),
        };
        Ok(self.publish(event, Audience::StateSubscribers).len())
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Counters for `/status`.
    pub fn stats(&self) -> BridgeStats {
        let state = self.inner.state.lock();
        BridgeStats {
            messages_received: self.inner.counters.messages_received.load(Ordering::Relaxed),
            messages_sent: self.inner.counters.messages_sent.load(Ordering::Relaxed),
            errors: self.inner.counters.errors.load(Ordering::Relaxed),
            connections: state.connection_count(),
            bound_tasks: state.owners.len(),
            open_buffers: state.reconciler.open_buffers(),
        }
    }

    /// Open streams.
    pub fn connection_count(&self) -> usize {
        self.inner.state.lock().connection_count()
    }

    /// The client's bound task.
    pub fn bound_task(&self, client_id: &ClientId) -> Option<TaskId> {
        self.inner.state.lock().bound_task(client_id).cloned()
    }

    /// Whether the client has a session.
    pub fn has_session(&self, client_id: &ClientId) -> bool {
        self.inner.state.lock().sessions.contains_key(client_id)
    }

    /// The client's event subscription, sorted.
    pub fn subscription(&self, client_id: &ClientId) -> Option<Vec<String>> {
        self.inner
            .state
            .lock()
            .dispatcher
            .subscriptions()
            .subscription(client_id)
    }

    /// Whether `ts` was delivered for `task_id`.
    pub fn is_delivered(&self, task_id: &TaskId, ts: i64) -> bool {
        self.inner.state.lock().reconciler.is_delivered(task_id, ts)
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_open_buffers(state: &BridgeState) {
    gauge!(BRIDGE_OPEN_BUFFERS).set(state.reconciler.open_buffers() as f64);
}

#[cfg(test)]
mod tests;
