//! Frames of the streaming RPC channel (`/control`).
//!
//! Client frames are [`CommandRequest`]s: a `requestId` plus exactly one
//! command key. Server frames are [`ExtensionMessage`]s: a `type`, an optional
//! correlation id and exactly one payload key.

use serde::{Deserialize, Serialize};

use super::message::WireMessage;
use super::state::{ApiProvider, WireChatMode, WireState};

/// Kind of answer in `submitAskResponse`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum AskResponseType {
    #[default]
    #[serde(rename = "ASK_RESPONSE_TYPE_UNSPECIFIED")]
    Unspecified,
    MessageResponse,
    YesButtonClicked,
    NoButtonClicked,
}

/// Text plus attachments, used by `startTask` and `sendUserInput`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRequest {
    /// Text; may be absent when images are attached.
    pub text: Option<String>,
    /// Image data URLs.
    pub images: Vec<String>,
}

/// `submitAskResponse`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AskResponseRequest {
    /// Answer kind; `ASK_RESPONSE_TYPE_UNSPECIFIED` is rejected.
    pub ask_response_type: AskResponseType,
    /// Accompanying text.
    pub text: Option<String>,
    /// Image data URLs.
    pub images: Vec<String>,
}

/// `submitOptionsResponse`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsResponseRequest {
    /// The chosen option.
    pub selected_option: Option<String>,
}

/// `deleteTaskWithId`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskIdRequest {
    /// Target task.
    pub task_id: Option<String>,
}

/// API configuration changes in `updateSettings`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfigurationRequest {
    /// New provider; `API_PROVIDER_UNSPECIFIED` leaves it unchanged.
    pub api_provider: Option<ApiProvider>,
    /// New API key.
    pub api_key: Option<String>,
    /// New model id.
    pub api_model_id: Option<String>,
    /// New OpenAI-compatible base URL.
    pub open_ai_base_url: Option<String>,
    /// Replacement favourites.
    pub favorited_model_ids: Option<Vec<String>>,
}

/// `updateSettings`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSettingsRequest {
    /// Provider changes.
    pub api_configuration: Option<ApiConfigurationRequest>,
    /// Chat mode; `CHAT_MODE_UNSPECIFIED` means no change.
    pub chat_mode: Option<WireChatMode>,
}

/// `subscribe`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscribeRequest {
    /// Event type names or `*`.
    pub event_types: Vec<String>,
}

/// `openFile`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenFileRequest {
    /// Path to open.
    pub file_path: Option<String>,
}

/// `openImage`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenImageRequest {
    /// Image to open.
    pub image_path: Option<String>,
}

/// `openMention`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenMentionRequest {
    /// Mention to resolve.
    pub mention: Option<String>,
}

/// `checkpointDiff`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointDiffRequest {
    /// Timestamp of the checkpoint message.
    pub message_ts: Option<i64>,
    /// Diff only what changed since the last completion.
    pub see_new_changes_since_last_task_completion: bool,
}

/// `checkpointRestore`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointRestoreRequest {
    /// Timestamp of the checkpoint message.
    pub message_ts: Option<i64>,
    /// Restore scope.
    pub restore_type: Option<String>,
}

/// No fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// The oneof command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum ControlCommand {
    StartTask(TextRequest),
    ResumeLatestTask(Empty),
    SendUserInput(TextRequest),
    SubmitAskResponse(AskResponseRequest),
    SubmitOptionsResponse(OptionsResponseRequest),
    CancelTask(Empty),
    ClearTask(Empty),
    DeleteTaskWithId(TaskIdRequest),
    GetLatestState(Empty),
    UpdateSettings(UpdateSettingsRequest),
    Subscribe(SubscribeRequest),
    Unsubscribe(Empty),
    OpenFile(OpenFileRequest),
    OpenImage(OpenImageRequest),
    OpenMention(OpenMentionRequest),
    CheckpointDiff(CheckpointDiffRequest),
    CheckpointRestore(CheckpointRestoreRequest),
    CheckLatestChanges(Empty),
}

impl ControlCommand {
    /// The command's wire key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::StartTask(_) => "startTask",
            Self::ResumeLatestTask(_) => "resumeLatestTask",
            Self::SendUserInput(_) => "sendUserInput",
            Self::SubmitAskResponse(_) => "submitAskResponse",
            Self::SubmitOptionsResponse(_) => "submitOptionsResponse",
            Self::CancelTask(_) => "cancelTask",
            Self::ClearTask(_) => "clearTask",
            Self::DeleteTaskWithId(_) => "deleteTaskWithId",
            Self::GetLatestState(_) => "getLatestState",
            Self::UpdateSettings(_) => "updateSettings",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::OpenFile(_) => "openFile",
            Self::OpenImage(_) => "openImage",
            Self::OpenMention(_) => "openMention",
            Self::CheckpointDiff(_) => "checkpointDiff",
            Self::CheckpointRestore(_) => "checkpointRestore",
            Self::CheckLatestChanges(_) => "checkLatestChanges",
        }
    }
}

/// A client frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Correlation id echoed in `responseToRequestId`.
    #[serde(default)]
    pub request_id: Option<String>,
    /// The command.
    #[serde(flatten)]
    pub command: ControlCommand,
}

/// Server frame type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ExtensionMessageType {
    #[default]
    #[serde(rename = "EXTENSION_MESSAGE_TYPE_UNSPECIFIED")]
    Unspecified,
    TaskStarted,
    State,
    PartialMessage,
    Error,
    DidUpdateSettings,
    Ack,
}

/// The oneof server payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum ExtensionPayload {
    TaskStarted {
        task_id: String,
        version: String,
    },
    State(WireState),
    NewChatMessage(WireMessage),
    ErrorMessage {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
        kind: String,
    },
    Ack {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_changes: Option<bool>,
    },
}

/// A server frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMessage {
    /// Frame type.
    #[serde(rename = "type")]
    pub message_type: ExtensionMessageType,
    /// Request this frame answers, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_to_request_id: Option<String>,
    /// Payload.
    #[serde(flatten)]
    pub payload: Option<ExtensionPayload>,
}

impl ExtensionMessage {
    /// Frame with a payload.
    pub fn new(message_type: ExtensionMessageType, payload: ExtensionPayload) -> Self {
        Self {
            message_type,
            response_to_request_id: None,
            payload: Some(payload),
        }
    }

    /// Correlate with a request.
    #[must_use]
    pub fn in_response_to(mut self, request_id: Option<String>) -> Self {
        self.response_to_request_id = request_id;
        self
    }

    /// `ACK` for a command.
    pub fn ack(request_id: Option<String>, command: &str) -> Self {
        Self::new(
            ExtensionMessageType::Ack,
            ExtensionPayload::Ack {
                command: command.to_owned(),
                has_changes: None,
            },
        )
        .in_response_to(request_id)
    }

    /// `ACK` for `checkLatestChanges`, carrying the answer.
    pub fn changes(request_id: Option<String>, command: &str, has_changes: bool) -> Self {
        Self::new(
            ExtensionMessageType::Ack,
            ExtensionPayload::Ack {
                command: command.to_owned(),
                has_changes: Some(has_changes),
            },
        )
        .in_response_to(request_id)
    }
}
