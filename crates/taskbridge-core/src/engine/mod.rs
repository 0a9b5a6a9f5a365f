//! Collaborator boundaries: the task engine and the editor host.
//!
//! The bridge borrows tasks from a [`TaskEngine`]; it never owns their
//! lifecycle. Engine output arrives on a broadcast channel of
//! [`EngineEvent`]s obtained from [`TaskEngine::subscribe`], and task
//! disposal is signalled through the [`TaskHandle::disposed`] token.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;
use crate::ids::TaskId;
use crate::message::EngineMessage;
use crate::state::{AskResponse, EngineState, SettingsUpdate};

/// Result alias for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// A borrowed reference to one running task instance.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    /// The task's ID.
    pub id: TaskId,
    disposed: CancellationToken,
}

impl TaskHandle {
    /// Wrap a task ID and the engine's disposal token.
    pub fn new(id: TaskId, disposed: CancellationToken) -> Self {
        Self { id, disposed }
    }

    /// Token cancelled by the engine once the task has disposed itself.
    pub fn disposed(&self) -> CancellationToken {
        self.disposed.clone()
    }

    /// Whether the task has already been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }
}

/// Something the engine emitted.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A complete or partial message for a task.
    Message {
        /// Owning task.
        task_id: TaskId,
        /// The raw message.
        message: EngineMessage,
    },
    /// A full state snapshot.
    State {
        /// Task the snapshot belongs to, when the engine has one loaded.
        task_id: Option<TaskId>,
        /// The snapshot.
        state: EngineState,
    },
    /// A task disposed itself.
    Disposed {
        /// The disposed task.
        task_id: TaskId,
    },
}

/// The conversational task engine the bridge fronts.
#[async_trait]
pub trait TaskEngine: Send + Sync {
    /// Create a task from initial text and images.
    async fn start_task(&self, text: String, images: Vec<String>) -> EngineResult<TaskHandle>;

    /// Re-open the most recent persisted task.
    async fn resume_latest_task(&self) -> EngineResult<TaskHandle>;

    /// Abort a running task.
    async fn cancel_task(&self, task_id: &TaskId) -> EngineResult<()>;

    /// Abort a task as a user "start over". Defaults to [`cancel_task`](Self::cancel_task).
    async fn clear_task(&self, task_id: &TaskId) -> EngineResult<()> {
        self.cancel_task(task_id).await
    }

    /// Deliver free-form user input.
    async fn send_user_input(
        &self,
        task_id: &TaskId,
        text: String,
        images: Vec<String>,
    ) -> EngineResult<()>;

    /// Answer a pending ask.
    async fn submit_approval(
        &self,
        task_id: &TaskId,
        response: AskResponse,
        text: Option<String>,
        images: Vec<String>,
    ) -> EngineResult<()>;

    /// Remove a task from history.
    async fn delete_task(&self, task_id: &TaskId) -> EngineResult<()>;

    /// Whether the engine knows the task (running or historical).
    async fn task_exists(&self, task_id: &TaskId) -> EngineResult<bool>;

    /// Full current state.
    async fn state_snapshot(&self) -> EngineResult<EngineState>;

    /// Apply a settings change.
    async fn update_settings(&self, update: SettingsUpdate) -> EngineResult<()>;

    /// Present the workspace diff recorded at the checkpoint of `message_ts`.
    async fn checkpoint_diff(
        &self,
        task_id: &TaskId,
        message_ts: i64,
        since_last_completion: bool,
    ) -> EngineResult<()> {
        let _ = (task_id, message_ts, since_last_completion);
        Err(EngineError::Unavailable("checkpoints not supported".into()))
    }

    /// Restore the checkpoint of `message_ts`.
    async fn checkpoint_restore(
        &self,
        task_id: &TaskId,
        message_ts: i64,
        restore_type: &str,
    ) -> EngineResult<()> {
        let _ = (task_id, message_ts, restore_type);
        Err(EngineError::Unavailable("checkpoints not supported".into()))
    }

    /// Whether the latest completion of the task left new workspace changes.
    async fn latest_changes(&self, task_id: &TaskId) -> EngineResult<bool> {
        let _ = task_id;
        Err(EngineError::Unavailable("checkpoints not supported".into()))
    }

    /// Engine version string.
    fn version(&self) -> String;

    /// Subscribe to engine output.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// The editor process hosting the bridge. All calls are best effort.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Reveal the task UI.
    async fn focus(&self) -> Result<(), String>;

    /// Open a file in the editor.
    async fn open_file(&self, path: &str) -> Result<(), String>;

    /// Open an image. Defaults to [`open_file`](Self::open_file).
    async fn open_image(&self, path: &str) -> Result<(), String> {
        self.open_file(path).await
    }

    /// Resolve and open a chat mention.
    async fn open_mention(&self, mention: &str) -> Result<(), String> {
        Err(format!("cannot open mention {mention}"))
    }
}

/// Editor host that does nothing. Used when running standalone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHost;

#[async_trait]
impl EditorHost for NoopHost {
    async fn focus(&self) -> Result<(), String> {
        Ok(())
    }

    async fn open_file(&self, _path: &str) -> Result<(), String> {
        Ok(())
    }

    async fn open_mention(&self, _mention: &str) -> Result<(), String> {
        Ok(())
    }
}
