//! The router's shared state: sessions, bindings, reconciler, subscriptions.
//!
//! Everything here is synchronous. The router mutates it inside one lock
//! scope per step and never across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use taskbridge_core::{ClientId, ConnectionId, TaskId};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{Dispatcher, SessionView};
use crate::reconcile::Reconciler;
use crate::transport::connection::ClientConnection;

/// A client's binding to one task.
#[derive(Debug)]
pub struct BoundTask {
    /// The bound task.
    pub id: TaskId,
    /// Cancelled when the binding is released; stops the disposal watcher.
    pub release: CancellationToken,
}

/// One client and its open streams.
#[derive(Debug, Default)]
pub struct ClientSession {
    /// Open streams (one or more).
    pub connections: Vec<Arc<ClientConnection>>,
    /// Bound task, at most one.
    pub task: Option<BoundTask>,
}

/// All mutable bridge state.
#[derive(Debug, Default)]
pub struct BridgeState {
    pub(crate) sessions: HashMap<ClientId, ClientSession>,
    pub(crate) owners: HashMap<TaskId, ClientId>,
    pub(crate) reconciler: Reconciler,
    pub(crate) dispatcher: Dispatcher,
}

/// Result of [`BridgeState::bind`].
#[derive(Debug)]
pub enum BindOutcome {
    /// Bound. `displaced` is the client's previous task, now unbound.
    Bound {
        /// Cancelled when this binding ends.
        release: CancellationToken,
        /// Previous task of the client, if it was a different one.
        displaced: Option<TaskId>,
    },
    /// The client has no session.
    NoSession,
    /// Another client already holds the task.
    Owned(ClientId),
}

/// What detaching a stream left behind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Detached {
    /// Whether the stream was the client's last one.
    pub session_closed: bool,
    /// Task released because the session closed.
    pub released_task: Option<TaskId>,
}

impl BridgeState {
    /// Register a stream, creating the session on first contact.
    pub fn attach(&mut self, connection: Arc<ClientConnection>) -> usize {
        let session = self
            .sessions
            .entry(connection.client_id.clone())
            .or_default();
        session.connections.push(connection);
        session.connections.len()
    }

    /// Remove a stream. The last stream closes the session and releases
    /// every per-client structure.
    pub fn detach(&mut self, client_id: &ClientId, connection_id: &ConnectionId) -> Detached {
        let Some(session) = self.sessions.get_mut(client_id) else {
            return Detached::default();
        };
        session.connections.retain(|c| c.id != *connection_id);
        if !session.connections.is_empty() {
            return Detached::default();
        }

        let released_task = self.unbind(client_id);
        let _ = self.sessions.remove(client_id);
        let _ = self.dispatcher.subscriptions_mut().unsubscribe(client_id);
        self.reconciler.release_client(client_id);
        Detached {
            session_closed: true,
            released_task,
        }
    }

    /// Bind `task_id` to the client.
    ///
    /// The ownership check and the binding happen in this one call, so two
    /// clients can never both hold the same task. Rebinding the same task
    /// keeps its delivered set; binding a different task releases the
    /// previous one and reports it as displaced.
    pub fn bind(&mut self, client_id: &ClientId, task_id: &TaskId) -> BindOutcome {
        if let Some(owner) = self.owners.get(task_id) {
            if owner != client_id {
                return BindOutcome::Owned(owner.clone());
            }
        }
        let Some(session) = self.sessions.get_mut(client_id) else {
            return BindOutcome::NoSession;
        };
        let release = CancellationToken::new();
        let previous = session.task.replace(BoundTask {
            id: task_id.clone(),
            release: release.clone(),
        });
        let mut displaced = None;
        if let Some(old) = previous {
            old.release.cancel();
            if old.id != *task_id {
                let _ = self.owners.remove(&old.id);
                self.reconciler.release(client_id, &old.id);
                displaced = Some(old.id);
            }
        }
        let _ = self.owners.insert(task_id.clone(), client_id.clone());
        self.reconciler.track(task_id);
        BindOutcome::Bound { release, displaced }
    }

    /// Release the client's binding, its tracker and its buffers for that task.
    pub fn unbind(&mut self, client_id: &ClientId) -> Option<TaskId> {
        let bound = self.sessions.get_mut(client_id)?.task.take()?;
        bound.release.cancel();
        let _ = self.owners.remove(&bound.id);
        self.reconciler.release(client_id, &bound.id);
        Some(bound.id)
    }

    /// Release whichever client is bound to `task_id`.
    pub fn unbind_task(&mut self, task_id: &TaskId) -> Option<ClientId> {
        let owner = self.owners.get(task_id)?.clone();
        let _ = self.unbind(&owner);
        Some(owner)
    }

    /// The client's bound task.
    pub fn bound_task(&self, client_id: &ClientId) -> Option<&TaskId> {
        self.sessions.get(client_id)?.task.as_ref().map(|b| &b.id)
    }

    /// Owner of a task.
    pub fn owner(&self, task_id: &TaskId) -> Option<&ClientId> {
        self.owners.get(task_id)
    }

    /// Sessions as the dispatcher sees them.
    pub fn views(&self) -> impl Iterator<Item = SessionView<'_>> {
        self.sessions.iter().map(|(client_id, session)| SessionView {
            client_id,
            task: session.task.as_ref().map(|b| &b.id),
            connections: &session.connections,
        })
    }

    /// Open streams across all sessions.
    pub fn connection_count(&self) -> usize {
        self.sessions.values().map(|s| s.connections.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use taskbridge_core::message::{EngineMessage, SayType};
    use tokio::sync::mpsc;

    use crate::transport::connection::Flavor;

    fn make_connection(client: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ClientConnection::new(ClientId::from(client), Flavor::Socket, tx))
    }

    fn make_bound_state() -> (BridgeState, ClientId, TaskId, Arc<ClientConnection>) {
        let mut state = BridgeState::default();
        let conn = make_connection("c1");
        let _ = state.attach(Arc::clone(&conn));
        let client = ClientId::from("c1");
        let task = TaskId::from("t1");
        assert_matches!(state.bind(&client, &task), BindOutcome::Bound { displaced: None, .. });
        (state, client, task, conn)
    }

    #[test]
    fn bind_requires_session() {
        let mut state = BridgeState::default();
        assert_matches!(
            state.bind(&ClientId::from("ghost"), &TaskId::from("t1")),
            BindOutcome::NoSession
        );
        assert!(state.owners.is_empty());
    }

    #[test]
    fn bind_records_owner_and_tracker() {
        let (state, client, task, _) = make_bound_state();
        assert_eq!(state.owner(&task), Some(&client));
        assert_eq!(state.bound_task(&client), Some(&task));
        assert!(state.reconciler.is_tracking(&task));
    }

    #[test]
    fn rebinding_other_task_releases_previous() {
        let (mut state, client, task, _) = make_bound_state();
        let first = state.sessions[&client].task.as_ref().unwrap().release.clone();
        let t2 = TaskId::from("t2");
        let displaced = assert_matches!(
            state.bind(&client, &t2),
            BindOutcome::Bound { displaced, .. } => displaced
        );
        assert_eq!(displaced, Some(task.clone()));
        assert!(first.is_cancelled());
        assert!(state.owner(&task).is_none());
        assert!(!state.reconciler.is_tracking(&task));
        assert_eq!(state.owner(&t2), Some(&client));
    }

    #[test]
    fn rebinding_same_task_keeps_delivered() {
        let (mut state, client, task, _) = make_bound_state();
        let _ = state
            .reconciler
            .ingest(&client, &task, &EngineMessage::say(5, SayType::Text, "x"));
        assert_matches!(state.bind(&client, &task), BindOutcome::Bound { displaced: None, .. });
        assert!(state.reconciler.is_delivered(&task, 5));
    }

    #[test]
    fn bind_refuses_task_held_by_another_client() {
        let (mut state, owner, task, _) = make_bound_state();
        let _ = state.attach(make_connection("c2"));
        let other = ClientId::from("c2");

        assert_matches!(state.bind(&other, &task), BindOutcome::Owned(o) if o == owner);
        assert_eq!(state.owner(&task), Some(&owner));
        assert!(state.bound_task(&other).is_none());
        assert_eq!(state.bound_task(&owner), Some(&task));
    }

    #[test]
    fn unbind_task_finds_owner() {
        let (mut state, client, task, _) = make_bound_state();
        assert_eq!(state.unbind_task(&task), Some(client.clone()));
        assert!(state.bound_task(&client).is_none());
        assert!(state.unbind_task(&task).is_none());
    }

    #[test]
    fn detach_last_stream_releases_everything() {
        let (mut state, client, task, conn) = make_bound_state();
        let second = make_connection("c1");
        assert_eq!(state.attach(Arc::clone(&second)), 2);
        state
            .dispatcher
            .subscriptions_mut()
            .subscribe(&client, vec!["*".to_owned()]);
        let _ = state.reconciler.ingest(
            &client,
            &task,
            &EngineMessage::say(9, SayType::Text, "par").with_partial(true),
        );

        assert_eq!(state.detach(&client, &conn.id), Detached::default());
        assert_eq!(state.connection_count(), 1);

        let detached = state.detach(&client, &second.id);
        assert!(detached.session_closed);
        assert_eq!(detached.released_task, Some(task.clone()));
        assert!(state.sessions.is_empty());
        assert!(state.owners.is_empty());
        assert!(state.dispatcher.subscriptions().is_empty());
        assert_eq!(state.reconciler.open_buffers(), 0);
        assert!(!state.reconciler.is_tracking(&task));
    }
}
