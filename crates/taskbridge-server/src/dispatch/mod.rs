//! Subscription & Broadcast Dispatcher.
//!
//! Publishing is split in two so the router can hold its state lock only for
//! the cheap part:
//!
//! 1. [`Dispatcher::select`] picks target streams from an audience, the
//!    bound tasks and the subscription registry (under the lock)
//! 2. [`deliver`] renders the event once per transport flavor and enqueues
//!    it on every target stream (outside the lock)
//!
//! Delivery is fire-and-forget per stream. A full or closed queue on one
//! stream never affects the others; closed streams are reported back so the
//! router can detach them.

pub mod outbound;
pub mod subscriptions;

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use taskbridge_core::{ClientId, TaskId};
use tracing::{debug, warn};

use crate::metrics::BRIDGE_EVENTS_DROPPED_TOTAL;
use crate::transport::connection::{ClientConnection, Flavor};

pub use outbound::OutboundEvent;
pub use subscriptions::SubscriptionRegistry;

/// Who an event is addressed to, before subscription filtering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    /// The client bound to this task.
    Task(TaskId),
    /// One client.
    Client(ClientId),
    /// Every connected client.
    All,
    /// Clients explicitly subscribed to state events (heartbeat resync).
    StateSubscribers,
}

/// A client as the dispatcher sees it.
#[derive(Clone, Copy, Debug)]
pub struct SessionView<'a> {
    /// The client.
    pub client_id: &'a ClientId,
    /// Its bound task, if any.
    pub task: Option<&'a TaskId>,
    /// Its open streams.
    pub connections: &'a [Arc<ClientConnection>],
}

/// Streams chosen for one event.
#[derive(Debug, Default)]
pub struct Targets {
    /// Clients receiving the event.
    pub clients: Vec<ClientId>,
    /// Their streams.
    pub connections: Vec<Arc<ClientConnection>>,
}

/// Outcome of one delivery.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Frames enqueued.
    pub delivered: usize,
    /// Frames dropped on a full queue.
    pub dropped: usize,
    /// Streams whose writer is gone.
    pub closed: Vec<Arc<ClientConnection>>,
}

/// Routing policy: the subscription registry plus audience rules.
#[derive(Debug, Default)]
pub struct Dispatcher {
    subscriptions: SubscriptionRegistry,
}

impl Dispatcher {
    /// Create a dispatcher with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscription registry.
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Mutable subscription registry.
    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionRegistry {
        &mut self.subscriptions
    }

    /// Pick the streams that should receive an event of `event_type`.
    pub fn select<'a>(
        &self,
        audience: &Audience,
        event_type: &str,
        sessions: impl IntoIterator<Item = SessionView<'a>>,
    ) -> Targets {
        let mut targets = Targets::default();
        for session in sessions {
            let addressed = match audience {
                Audience::Task(task_id) => session.task == Some(task_id),
                Audience::Client(client_id) => session.client_id == client_id,
                Audience::All => true,
                Audience::StateSubscribers => self.subscriptions.wants_state(session.client_id),
            };
            if !addressed || !self.subscriptions.accepts(session.client_id, event_type) {
                continue;
            }
            targets.clients.push(session.client_id.clone());
            targets.connections.extend(session.connections.iter().cloned());
        }
        targets
    }
}

/// Render `event` once per flavor and enqueue it on every stream.
pub fn deliver(event: &OutboundEvent, connections: &[Arc<ClientConnection>]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let mut rendered: HashMap<Flavor, Option<Arc<String>>> = HashMap::new();

    for conn in connections {
        let frame = rendered
            .entry(conn.flavor)
            .or_insert_with(|| match event.render(conn.flavor) {
                Ok(json) => Some(Arc::new(json)),
                Err(error) => {
                    warn!(
                        event_type = event.event_type(),
                        flavor = conn.flavor.as_str(),
                        %error,
                        "failed to serialize event"
                    );
                    None
                }
            });
        let Some(frame) = frame else { continue };

        if conn.send(Arc::clone(frame)) {
            report.delivered += 1;
        } else if conn.is_closed() {
            debug!(
                client_id = %conn.client_id,
                connection_id = %conn.id,
                "stream closed, scheduling cleanup"
            );
            counter!(BRIDGE_EVENTS_DROPPED_TOTAL).increment(1);
            report.closed.push(Arc::clone(conn));
        } else {
            warn!(
                client_id = %conn.client_id,
                connection_id = %conn.id,
                event_type = event.event_type(),
                dropped = conn.drop_count(),
                "client queue full, event dropped"
            );
            counter!(BRIDGE_EVENTS_DROPPED_TOTAL).increment(1);
            report.dropped += 1;
        }
    }

    debug!(
        event_type = event.event_type(),
        recipients = connections.len(),
        delivered = report.delivered,
        "event fanned out"
    );
    report
}
