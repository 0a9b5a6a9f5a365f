//! Events the bridge pushes to clients, and their per-transport renderings.

use serde_json::{Map, Value};
use taskbridge_core::TaskId;
use taskbridge_protocol::errors::ErrorBody;
use taskbridge_protocol::wire::{
    ExtensionMessage, ExtensionMessageType, ExtensionPayload, SocketFrame, WireMessage, WireState,
};

use crate::transport::connection::Flavor;

/// A server-originated event.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEvent {
    /// A task was created for a client.
    TaskStarted {
        /// New task.
        task_id: TaskId,
        /// Engine version.
        version: String,
    },
    /// A reconciled message.
    Message {
        /// Owning task.
        task_id: TaskId,
        /// Translated message.
        message: Box<WireMessage>,
    },
    /// A full state snapshot.
    State {
        /// Task the snapshot was taken for, if any.
        task_id: Option<TaskId>,
        /// Translated state.
        state: Box<WireState>,
    },
    /// A task or command error.
    Error {
        /// Related task, if any.
        task_id: Option<TaskId>,
        /// Error body.
        body: ErrorBody,
    },
    /// Engine settings changed.
    SettingsUpdated,
}

impl OutboundEvent {
    /// Event type name used for subscription matching.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "task_started",
            Self::Message { .. } => "message",
            Self::State { .. } => "state",
            Self::Error { .. } => "error",
            Self::SettingsUpdated => "settings_updated",
        }
    }

    /// Render for one transport.
    pub fn render(&self, flavor: Flavor) -> serde_json::Result<String> {
        match flavor {
            Flavor::Socket => serde_json::to_string(&self.to_socket()?),
            Flavor::Control => serde_json::to_string(&self.to_control()),
        }
    }

    /// Socket envelope.
    pub fn to_socket(&self) -> serde_json::Result<SocketFrame> {
        let frame = match self {
            Self::TaskStarted { task_id, version } => SocketFrame::event(
                "task_started",
                Some(task_id.to_string()),
                object([
                    ("taskId", Value::String(task_id.to_string())),
                    ("version", Value::String(version.clone())),
                ]),
            ),
            Self::Message { task_id, message } => SocketFrame::event(
                "message",
                Some(task_id.to_string()),
                object([
                    ("taskId", Value::String(task_id.to_string())),
                    ("message", serde_json::to_value(message)?),
                ]),
            ),
            Self::State { task_id, state } => SocketFrame::event(
                "state_update",
                task_id.as_ref().map(ToString::to_string),
                object([("state", serde_json::to_value(state)?)]),
            ),
            Self::Error { task_id, body } => {
                let mut fields = vec![
                    ("message", Value::String(body.message.clone())),
                    ("kind", Value::String(body.kind.clone())),
                    ("code", Value::String(body.code.clone())),
                ];
                if let Some(details) = &body.details {
                    fields.push(("details", details.clone()));
                }
                let task_id = task_id.as_ref().map(ToString::to_string);
                SocketFrame::event("error", task_id, object(fields))
            }
            Self::SettingsUpdated => {
                SocketFrame::event("settings_updated", None, Value::Object(Map::new()))
            }
        };
        Ok(frame)
    }

    /// Streaming RPC frame.
    pub fn to_control(&self) -> ExtensionMessage {
        match self {
            Self::TaskStarted { task_id, version } => ExtensionMessage::new(
                ExtensionMessageType::TaskStarted,
                ExtensionPayload::TaskStarted {
                    task_id: task_id.to_string(),
                    version: version.clone(),
                },
            ),
            Self::Message { message, .. } => ExtensionMessage::new(
                ExtensionMessageType::Unspecified,
                ExtensionPayload::NewChatMessage((**message).clone()),
            ),
            Self::State { state, .. } => ExtensionMessage::new(
                ExtensionMessageType::State,
                ExtensionPayload::State((**state).clone()),
            ),
            Self::Error { body, .. } => ExtensionMessage::new(
                ExtensionMessageType::Error,
                ExtensionPayload::ErrorMessage {
                    message: body.message.clone(),
                    details: body.details.clone(),
                    kind: body.kind.clone(),
                },
            ),
            Self::SettingsUpdated => ExtensionMessage {
                message_type: ExtensionMessageType::DidUpdateSettings,
                response_to_request_id: None,
                payload: None,
            },
        }
    }
}

fn object<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    Value::Object(fields.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}
