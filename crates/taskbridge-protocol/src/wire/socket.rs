//! Frames of the duplex socket channel (`/ws`).
//!
//! Every frame, in both directions, is the same envelope:
//! `{type, id?, taskId?, payload?}`. Replies echo the request's `type` and
//! `id`; events carry no `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors::ErrorBody;

/// The socket envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketFrame {
    /// Frame type (`task_init`, `message`, ...).
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Request id, echoed in replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Task the frame refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Frame body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl SocketFrame {
    /// A server-pushed event.
    pub fn event(frame_type: impl Into<String>, task_id: Option<String>, payload: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            id: None,
            task_id,
            payload: Some(payload),
        }
    }

    /// A success reply. `extra` object fields are merged next to `success: true`.
    pub fn success(frame_type: impl Into<String>, id: Option<String>, extra: Value) -> Self {
        let mut body = Map::new();
        let _ = body.insert("success".into(), Value::Bool(true));
        if let Value::Object(fields) = extra {
            body.extend(fields);
        }
        Self {
            frame_type: frame_type.into(),
            id,
            task_id: None,
            payload: Some(Value::Object(body)),
        }
    }

    /// An error reply.
    pub fn error(id: Option<String>, error: &ErrorBody) -> Self {
        let mut payload = json!({
            "success": false,
            "error": error.message,
            "code": error.code,
            "kind": error.kind,
        });
        if let (Some(details), Value::Object(map)) = (&error.details, &mut payload) {
            let _ = map.insert("details".into(), details.clone());
        }
        Self {
            frame_type: "error".into(),
            id,
            task_id: None,
            payload: Some(payload),
        }
    }

    /// The payload, or an empty object.
    pub fn payload_or_empty(&self) -> Value {
        self.payload.clone().unwrap_or_else(|| Value::Object(Map::new()))
    }
}

// ── Inbound payloads ────────────────────────────────────────────────

/// `task_init`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInitPayload {
    /// Task text.
    pub task: Option<String>,
    /// Image data URLs.
    pub images: Vec<String>,
}

/// `task_response`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskResponsePayload {
    /// `messageResponse`, `yesButtonClicked` or `noButtonClicked`.
    pub response: Option<String>,
    /// Accompanying text.
    pub text: Option<String>,
    /// Image data URLs.
    pub images: Vec<String>,
}

/// `user_input`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInputPayload {
    /// Text.
    pub text: Option<String>,
    /// Image data URLs.
    pub images: Vec<String>,
}

/// `options_response`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsResponsePayload {
    /// The chosen option.
    pub selected_option: Option<String>,
}

/// `task_delete`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDeletePayload {
    /// Task to delete.
    pub task_id: Option<String>,
}

/// `chat_mode_update`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatModePayload {
    /// `plan` or `act`.
    pub mode: Option<String>,
}

/// `event_subscribe`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscribePayload {
    /// Event type names or `*`.
    pub event_types: Vec<String>,
}

/// `file_open`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileOpenPayload {
    /// Path to open.
    pub file_path: Option<String>,
}

/// `image_open`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageOpenPayload {
    /// Image to open.
    pub image_path: Option<String>,
}

/// `mention_open`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentionOpenPayload {
    /// Mention to resolve.
    pub mention: Option<String>,
}

/// `checkpoint_diff`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointDiffPayload {
    /// Timestamp of the checkpoint message.
    pub message_ts: Option<i64>,
    /// Diff only what changed since the last completion.
    pub see_new_changes_since_last_task_completion: bool,
}

/// `checkpoint_restore`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckpointRestorePayload {
    /// Timestamp of the checkpoint message.
    pub message_ts: Option<i64>,
    /// Restore scope.
    pub restore_type: Option<String>,
}
