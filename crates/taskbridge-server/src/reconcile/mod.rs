//! Message Reconciliation Engine.
//!
//! The engine streams each logical message as a run of partial updates
//! sharing one `ts`, and may redeliver the finished message later through a
//! state snapshot. [`Reconciler::ingest`] folds those updates into exactly one
//! materialized message per `(task, ts)`:
//!
//! - partial events accumulate into a [`LogicalMessageBuffer`] keyed by
//!   `(client, task, ts)`, merged with [`merge::merge_overlap`]
//! - the first complete event closes the buffer and emits the message
//! - every later event for a delivered `ts` is discarded
//!
//! The reconciler is plain data; the router owns it behind its state lock.

pub mod merge;

use std::collections::{HashMap, HashSet};

use taskbridge_core::message::EngineMessage;
use taskbridge_core::{ClientId, TaskId};
use tracing::{debug, warn};

pub use merge::merge_overlap;

type BufferKey = (ClientId, TaskId, i64);

/// An open logical message: the first event's metadata plus the merged text.
#[derive(Clone, Debug)]
pub struct LogicalMessageBuffer {
    canonical: EngineMessage,
    text: String,
    partial: bool,
}

impl LogicalMessageBuffer {
    fn open(first: &EngineMessage) -> Self {
        Self {
            canonical: first.clone(),
            text: first.text_or_empty().to_owned(),
            partial: first.is_partial(),
        }
    }

    fn absorb(&mut self, event: &EngineMessage) {
        merge_overlap(&mut self.text, event.text_or_empty());
        self.partial = event.is_partial();
    }

    fn finish(self) -> EngineMessage {
        let mut message = self.canonical;
        message.text = Some(self.text);
        message.partial = Some(false);
        message
    }

    /// Text merged so far.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// What one event produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Ingest {
    /// Partial event absorbed; nothing to emit yet.
    Pending,
    /// The message completed and is emitted exactly once.
    Emitted(EngineMessage),
    /// The `ts` was already delivered for this task.
    Duplicate,
    /// The event cannot be reconciled (no `ts`, or task not tracked).
    Dropped,
}

/// Buffers and delivered-message trackers for every bound task.
#[derive(Debug, Default)]
pub struct Reconciler {
    buffers: HashMap<BufferKey, LogicalMessageBuffer>,
    delivered: HashMap<TaskId, HashSet<i64>>,
}

impl Reconciler {
    /// Create an empty reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a task with an empty delivered set. Re-tracking keeps
    /// whatever was already delivered.
    pub fn track(&mut self, task_id: &TaskId) {
        let _ = self.delivered.entry(task_id.clone()).or_default();
    }

    /// Whether `task_id` is tracked.
    pub fn is_tracking(&self, task_id: &TaskId) -> bool {
        self.delivered.contains_key(task_id)
    }

    /// Feed one event for `(client, task)`.
    pub fn ingest(
        &mut self,
        client_id: &ClientId,
        task_id: &TaskId,
        event: &EngineMessage,
    ) -> Ingest {
        let Some(ts) = event.ts else {
            warn!(%client_id, %task_id, subtype = event.subtype(), "message without ts dropped");
            return Ingest::Dropped;
        };
        let Some(delivered) = self.delivered.get_mut(task_id) else {
            debug!(%client_id, %task_id, ts, "message for untracked task dropped");
            return Ingest::Dropped;
        };
        if delivered.contains(&ts) {
            debug!(%task_id, ts, "already delivered, suppressing");
            return Ingest::Duplicate;
        }

        let key = (client_id.clone(), task_id.clone(), ts);
        let buffer = self
            .buffers
            .entry(key.clone())
            .and_modify(|b| b.absorb(event))
            .or_insert_with(|| LogicalMessageBuffer::open(event));
        if buffer.partial {
            return Ingest::Pending;
        }

        let Some(buffer) = self.buffers.remove(&key) else {
            return Ingest::Pending;
        };
        let _ = delivered.insert(ts);
        Ingest::Emitted(buffer.finish())
    }

    /// Drop the tracker and every buffer for `(client, task)`.
    pub fn release(&mut self, client_id: &ClientId, task_id: &TaskId) {
        let _ = self.delivered.remove(task_id);
        self.buffers
            .retain(|(c, t, _), _| !(c == client_id && t == task_id));
    }

    /// Drop every buffer opened for `client_id`.
    pub fn release_client(&mut self, client_id: &ClientId) {
        self.buffers.retain(|(c, _, _), _| c != client_id);
    }

    /// Open buffers across all clients.
    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// The open buffer for a key, if any.
    pub fn buffer(
        &self,
        client_id: &ClientId,
        task_id: &TaskId,
        ts: i64,
    ) -> Option<&LogicalMessageBuffer> {
        self.buffers.get(&(client_id.clone(), task_id.clone(), ts))
    }

    /// Whether `ts` was delivered for `task_id`.
    pub fn is_delivered(&self, task_id: &TaskId, ts: i64) -> bool {
        self.delivered
            .get(task_id)
            .is_some_and(|set| set.contains(&ts))
    }
}
