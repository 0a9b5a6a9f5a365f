//! In-memory [`TaskEngine`] for standalone runs and tests.
//!
//! Tasks get sequential IDs (`t1`, `t2`, ...). Starting a task records its
//! `say:task` message in the task's history without emitting it; everything
//! else the engine "says" is scripted by the host through
//! [`InMemoryEngine::emit_message`] and [`InMemoryEngine::emit_state`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{EngineEvent, EngineResult, TaskEngine, TaskHandle};
use crate::errors::EngineError;
use crate::ids::TaskId;
use crate::message::{EngineMessage, SayType};
use crate::state::{
    ApiConfiguration, AskResponse, EngineState, HistoryItem, SettingsUpdate,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A call the engine received, recorded for assertions.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    /// `start_task`.
    StartTask {
        /// Task text.
        text: String,
        /// Images.
        images: Vec<String>,
    },
    /// `resume_latest_task`.
    ResumeLatestTask,
    /// `cancel_task`.
    CancelTask(TaskId),
    /// `clear_task`.
    ClearTask(TaskId),
    /// `send_user_input`.
    SendUserInput {
        /// Target task.
        task_id: TaskId,
        /// Input text.
        text: String,
        /// Images.
        images: Vec<String>,
    },
    /// `submit_approval`.
    SubmitApproval {
        /// Target task.
        task_id: TaskId,
        /// Answer kind.
        response: AskResponse,
        /// Accompanying text.
        text: Option<String>,
    },
    /// `delete_task`.
    DeleteTask(TaskId),
    /// `update_settings`.
    UpdateSettings(SettingsUpdate),
    /// `checkpoint_diff`.
    CheckpointDiff {
        /// Target task.
        task_id: TaskId,
        /// Checkpoint message.
        message_ts: i64,
        /// Only changes since the last completion.
        since_last_completion: bool,
    },
    /// `checkpoint_restore`.
    CheckpointRestore {
        /// Target task.
        task_id: TaskId,
        /// Checkpoint message.
        message_ts: i64,
        /// Restore scope.
        restore_type: String,
    },
    /// `latest_changes`.
    LatestChanges(TaskId),
}

struct TaskEntry {
    item: HistoryItem,
    messages: Vec<EngineMessage>,
    disposed: CancellationToken,
    has_changes: bool,
}

impl TaskEntry {
    fn checkpoint(&self, task_id: &TaskId, message_ts: i64) -> EngineResult<()> {
        if self.messages.iter().any(|m| m.ts == Some(message_ts)) {
            Ok(())
        } else {
            Err(EngineError::Failed(format!(
                "task {task_id} has no message at {message_ts}"
            )))
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    tasks: HashMap<TaskId, TaskEntry>,
    /// Creation order, oldest first.
    order: Vec<TaskId>,
    current: Option<TaskId>,
    calls: Vec<EngineCall>,
    fail_next: Option<EngineError>,
    api_configuration: ApiConfiguration,
    chat_mode: Option<crate::state::ChatMode>,
}

impl Inner {
    fn take_failure(&mut self) -> EngineResult<()> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn entry(&self, task_id: &TaskId) -> EngineResult<&TaskEntry> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))
    }

    fn entry_mut(&mut self, task_id: &TaskId) -> EngineResult<&mut TaskEntry> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))
    }
}

/// Engine that keeps everything in memory.
pub struct InMemoryEngine {
    inner: Mutex<Inner>,
    events: broadcast::Sender<EngineEvent>,
    version: String,
}

impl InMemoryEngine {
    /// Create an empty engine reporting the given version.
    pub fn new(version: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            version: version.into(),
        }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    /// Make the next engine call fail with `err`.
    pub fn fail_next(&self, err: EngineError) {
        self.inner.lock().fail_next = Some(err);
    }

    /// The currently loaded task.
    pub fn current_task(&self) -> Option<TaskId> {
        self.inner.lock().current.clone()
    }

    /// Emit a message event for `task_id`. The message is also stored in the
    /// task's history, replacing any earlier version with the same `ts`.
    pub fn emit_message(&self, task_id: &TaskId, message: EngineMessage) {
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.tasks.get_mut(task_id) {
                match entry
                    .messages
                    .iter_mut()
                    .find(|m| m.ts.is_some() && m.ts == message.ts)
                {
                    Some(existing) => *existing = message.clone(),
                    None => entry.messages.push(message.clone()),
                }
            }
        }
        self.send(EngineEvent::Message {
            task_id: task_id.clone(),
            message,
        });
    }

    /// Script whether the task's latest completion left new changes.
    pub fn set_has_changes(&self, task_id: &TaskId, has_changes: bool) {
        if let Some(entry) = self.inner.lock().tasks.get_mut(task_id) {
            entry.has_changes = has_changes;
        }
    }

    /// The task's stored messages, oldest first.
    pub fn messages(&self, task_id: &TaskId) -> Vec<EngineMessage> {
        self.inner
            .lock()
            .tasks
            .get(task_id)
            .map(|e| e.messages.clone())
            .unwrap_or_default()
    }

    /// Emit a full state snapshot event.
    pub fn emit_state(&self) {
        let (task_id, state) = {
            let inner = self.inner.lock();
            (inner.current.clone(), self.snapshot(&inner))
        };
        self.send(EngineEvent::State { task_id, state });
    }

    /// Dispose a task: cancel its token and emit `Disposed`.
    pub fn dispose(&self, task_id: &TaskId) {
        let found = {
            let mut inner = self.inner.lock();
            if inner.current.as_ref() == Some(task_id) {
                inner.current = None;
            }
            match inner.tasks.get(task_id) {
                Some(entry) => {
                    entry.disposed.cancel();
                    true
                }
                None => false,
            }
        };
        if found {
            self.send(EngineEvent::Disposed {
                task_id: task_id.clone(),
            });
        }
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("engine event emitted with no subscribers");
        }
    }

    fn snapshot(&self, inner: &Inner) -> EngineState {
        let current = inner.current.as_ref().and_then(|id| inner.tasks.get(id));
        EngineState {
            version: Some(self.version.clone()),
            messages: current.map(|e| e.messages.clone()).unwrap_or_default(),
            current_task: current.map(|e| e.item.clone()),
            task_history: inner
                .order
                .iter()
                .rev()
                .filter_map(|id| inner.tasks.get(id).map(|e| e.item.clone()))
                .collect(),
            api_configuration: inner.api_configuration.clone(),
            chat_mode: inner.chat_mode,
            platform: Some(host_platform().to_owned()),
            telemetry_setting: Some("unset".to_owned()),
            ..EngineState::default()
        }
    }

    fn open(inner: &mut Inner, id: &TaskId) -> TaskHandle {
        let token = CancellationToken::new();
        if let Some(entry) = inner.tasks.get_mut(id) {
            entry.disposed = token.clone();
        }
        inner.current = Some(id.clone());
        TaskHandle::new(id.clone(), token)
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Node-style platform tag for the host OS.
fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        "solaris" | "illumos" => "sunos",
        other => other,
    }
}

#[async_trait]
impl TaskEngine for InMemoryEngine {
    async fn start_task(&self, text: String, images: Vec<String>) -> EngineResult<TaskHandle> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::StartTask {
            text: text.clone(),
            images: images.clone(),
        });
        inner.take_failure()?;

        inner.next_id += 1;
        let id = TaskId::from(format!("t{}", inner.next_id));
        let ts = now_ms();
        let mut first = EngineMessage::say(ts, SayType::Task, text.clone());
        first.images = images;
        let _ = inner.tasks.insert(
            id.clone(),
            TaskEntry {
                item: HistoryItem {
                    id: id.clone(),
                    ts,
                    task: text,
                    ..HistoryItem::default()
                },
                messages: vec![first],
                disposed: CancellationToken::new(),
                has_changes: false,
            },
        );
        inner.order.push(id.clone());
        Ok(Self::open(&mut inner, &id))
    }

    async fn resume_latest_task(&self) -> EngineResult<TaskHandle> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::ResumeLatestTask);
        inner.take_failure()?;
        let id = inner
            .order
            .last()
            .cloned()
            .ok_or(EngineError::NothingToResume)?;
        Ok(Self::open(&mut inner, &id))
    }

    async fn cancel_task(&self, task_id: &TaskId) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::CancelTask(task_id.clone()));
        inner.take_failure()?;
        let _ = inner.entry(task_id)?;
        Ok(())
    }

    async fn clear_task(&self, task_id: &TaskId) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::ClearTask(task_id.clone()));
        inner.take_failure()?;
        let _ = inner.entry(task_id)?;
        if inner.current.as_ref() == Some(task_id) {
            inner.current = None;
        }
        Ok(())
    }

    async fn send_user_input(
        &self,
        task_id: &TaskId,
        text: String,
        images: Vec<String>,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SendUserInput {
            task_id: task_id.clone(),
            text,
            images,
        });
        inner.take_failure()?;
        let _ = inner.entry(task_id)?;
        Ok(())
    }

    async fn submit_approval(
        &self,
        task_id: &TaskId,
        response: AskResponse,
        text: Option<String>,
        _images: Vec<String>,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::SubmitApproval {
            task_id: task_id.clone(),
            response,
            text,
        });
        inner.take_failure()?;
        let _ = inner.entry(task_id)?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &TaskId) -> EngineResult<()> {
        let removed = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::DeleteTask(task_id.clone()));
            inner.take_failure()?;
            let entry = inner
                .tasks
                .remove(task_id)
                .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
            inner.order.retain(|id| id != task_id);
            if inner.current.as_ref() == Some(task_id) {
                inner.current = None;
            }
            entry.disposed
        };
        if !removed.is_cancelled() {
            removed.cancel();
            self.send(EngineEvent::Disposed {
                task_id: task_id.clone(),
            });
        }
        Ok(())
    }

    async fn task_exists(&self, task_id: &TaskId) -> EngineResult<bool> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        Ok(inner.tasks.contains_key(task_id))
    }

    async fn state_snapshot(&self) -> EngineResult<EngineState> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        Ok(self.snapshot(&inner))
    }

    async fn update_settings(&self, update: SettingsUpdate) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::UpdateSettings(update.clone()));
        inner.take_failure()?;
        if let Some(api) = update.api_configuration {
            let cfg = &mut inner.api_configuration;
            if api.api_provider.is_some() {
                cfg.api_provider = api.api_provider;
            }
            if api.api_model_id.is_some() {
                cfg.api_model_id = api.api_model_id;
            }
            if api.api_key.is_some() {
                cfg.api_key = api.api_key;
            }
            if api.open_ai_base_url.is_some() {
                cfg.open_ai_base_url = api.open_ai_base_url;
            }
            if let Some(ids) = api.favorited_model_ids {
                cfg.favorited_model_ids = ids;
            }
        }
        if update.chat_mode.is_some() {
            inner.chat_mode = update.chat_mode;
        }
        Ok(())
    }

    async fn checkpoint_diff(
        &self,
        task_id: &TaskId,
        message_ts: i64,
        since_last_completion: bool,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::CheckpointDiff {
            task_id: task_id.clone(),
            message_ts,
            since_last_completion,
        });
        inner.take_failure()?;
        inner.entry(task_id)?.checkpoint(task_id, message_ts)
    }

    /// Drops every message after the checkpoint and clears pending changes.
    async fn checkpoint_restore(
        &self,
        task_id: &TaskId,
        message_ts: i64,
        restore_type: &str,
    ) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::CheckpointRestore {
            task_id: task_id.clone(),
            message_ts,
            restore_type: restore_type.to_owned(),
        });
        inner.take_failure()?;
        let entry = inner.entry_mut(task_id)?;
        entry.checkpoint(task_id, message_ts)?;
        entry.messages.retain(|m| m.ts.is_some_and(|ts| ts <= message_ts));
        entry.has_changes = false;
        Ok(())
    }

    async fn latest_changes(&self, task_id: &TaskId) -> EngineResult<bool> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::LatestChanges(task_id.clone()));
        inner.take_failure()?;
        Ok(inner.entry(task_id)?.has_changes)
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}
