//! Transport-neutral command set.
//!
//! Both transports decode their frames into [`BridgeCommand`] so a single
//! router handles every inbound request.

use crate::ids::TaskId;
use crate::state::{AskResponse, SettingsUpdate};

/// A typed command from an external client.
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeCommand {
    /// Create a new task.
    StartTask {
        /// Initial task text.
        text: String,
        /// Attached image data URLs.
        images: Vec<String>,
    },
    /// Resume the most recent persisted task.
    ResumeLatestTask,
    /// Send free-form input to the bound task.
    SendUserInput {
        /// Input text.
        text: String,
        /// Attached images.
        images: Vec<String>,
    },
    /// Answer the bound task's pending ask.
    SubmitApprovalResponse {
        /// Kind of answer.
        response: AskResponse,
        /// Optional accompanying text.
        text: Option<String>,
        /// Attached images.
        images: Vec<String>,
    },
    /// Pick one of the options the bound task offered.
    SubmitOptionsResponse {
        /// The chosen option text.
        option: String,
    },
    /// Abort the bound task.
    CancelTask,
    /// Abort the bound task as a "start over".
    ClearTask,
    /// Delete a task from history.
    DeleteTaskById {
        /// Task to delete.
        task_id: TaskId,
    },
    /// Fetch the full engine state.
    RequestState,
    /// Change engine settings.
    UpdateSettings(SettingsUpdate),
    /// Replace the client's event subscription.
    Subscribe {
        /// Event type names, or `*`.
        event_types: Vec<String>,
    },
    /// Remove the client's event subscription.
    Unsubscribe,
    /// Open a file in the editor host.
    OpenFile {
        /// File path.
        path: String,
    },
    /// Open an image in the editor host.
    OpenImage {
        /// Image path.
        path: String,
    },
    /// Open a chat mention (file, folder, problems, url) in the editor host.
    OpenMention {
        /// Mention text as it appears in the message.
        mention: String,
    },
    /// Show the workspace diff at a message's checkpoint.
    CheckpointDiff {
        /// Timestamp of the message carrying the checkpoint.
        message_ts: i64,
        /// Diff only what changed since the last completed attempt.
        since_last_completion: bool,
    },
    /// Roll the bound task back to a message's checkpoint.
    CheckpointRestore {
        /// Timestamp of the message carrying the checkpoint.
        message_ts: i64,
        /// What to restore (`task`, `workspace`, `taskAndWorkspace`).
        restore_type: String,
    },
    /// Ask whether the last completion left new workspace changes.
    CheckLatestChanges,
}

/// Whether a message carries anything: non-blank text or at least one image.
///
/// Task creation and user input both use this rule.
pub fn has_input(text: &str, images: &[String]) -> bool {
    !text.trim().is_empty() || !images.is_empty()
}

impl BridgeCommand {
    /// Stable name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartTask { .. } => "start_task",
            Self::ResumeLatestTask => "resume_latest_task",
            Self::SendUserInput { .. } => "send_user_input",
            Self::SubmitApprovalResponse { .. } => "submit_approval_response",
            Self::SubmitOptionsResponse { .. } => "submit_options_response",
            Self::CancelTask => "cancel_task",
            Self::ClearTask => "clear_task",
            Self::DeleteTaskById { .. } => "delete_task_by_id",
            Self::RequestState => "request_state",
            Self::UpdateSettings(_) => "update_settings",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::OpenFile { .. } => "open_file",
            Self::OpenImage { .. } => "open_image",
            Self::OpenMention { .. } => "open_mention",
            Self::CheckpointDiff { .. } => "checkpoint_diff",
            Self::CheckpointRestore { .. } => "checkpoint_restore",
            Self::CheckLatestChanges => "check_latest_changes",
        }
    }

    /// Whether the command acts on the client's bound task.
    ///
    /// Session-level commands (settings, subscriptions, editor opens) do not.
    pub fn requires_task(&self) -> bool {
        matches!(
            self,
            Self::SendUserInput { .. }
                | Self::SubmitApprovalResponse { .. }
                | Self::SubmitOptionsResponse { .. }
                | Self::CancelTask
                | Self::ClearTask
                | Self::DeleteTaskById { .. }
                | Self::CheckpointDiff { .. }
                | Self::CheckpointRestore { .. }
                | Self::CheckLatestChanges
        )
    }
}
