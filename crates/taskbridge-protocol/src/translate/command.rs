//! Inbound frames to [`BridgeCommand`].
//!
//! Both transports decode here so the router sees a single command set.
//! Required fields are checked; nothing is coerced.

use serde::de::DeserializeOwned;
use taskbridge_core::BridgeCommand;
use taskbridge_core::command::has_input;
use taskbridge_core::TaskId;
use taskbridge_core::state::{AskResponse, ChatMode, SettingsUpdate};

use super::settings::settings_from_wire;
use crate::errors::DecodeError;
use crate::wire::control::{AskResponseType, CommandRequest, ControlCommand, TextRequest};
use crate::wire::socket::{
    ChatModePayload, CheckpointDiffPayload, CheckpointRestorePayload, FileOpenPayload,
    ImageOpenPayload, MentionOpenPayload, OptionsResponsePayload, SocketFrame, SubscribePayload,
    TaskDeletePayload, TaskInitPayload, TaskResponsePayload, UserInputPayload,
};

/// What a socket frame asks for.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketRequest {
    /// A router command.
    Command(BridgeCommand),
    /// Liveness probe answered by the transport itself.
    Ping,
}

fn payload<T: DeserializeOwned>(frame: &SocketFrame) -> Result<T, DecodeError> {
    serde_json::from_value(frame.payload_or_empty())
        .map_err(|e| DecodeError::invalid(format!("invalid {} payload: {e}", frame.frame_type)))
}

fn required(value: Option<&String>, field: &str) -> Result<String, DecodeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(DecodeError::invalid(format!("{field} is required"))),
    }
}

/// Text plus images where at least one of them is present.
fn text_or_images(
    text: Option<&String>,
    images: &[String],
    what: &str,
) -> Result<(String, Vec<String>), DecodeError> {
    let text = text.cloned().unwrap_or_default();
    if !has_input(&text, images) {
        return Err(DecodeError::invalid(format!("{what} requires text or images")));
    }
    Ok((text, images.to_vec()))
}

fn message_ts(value: Option<i64>) -> Result<i64, DecodeError> {
    value.ok_or_else(|| DecodeError::invalid("messageTs is required"))
}

fn checkpoint_restore(
    ts: Option<i64>,
    restore_type: Option<&String>,
) -> Result<BridgeCommand, DecodeError> {
    let restore_type = match restore_type {
        Some(t) if !t.trim().is_empty() => t.clone(),
        _ => return Err(DecodeError::invalid("restoreType is required")),
    };
    Ok(BridgeCommand::CheckpointRestore {
        message_ts: message_ts(ts)?,
        restore_type,
    })
}

fn event_types(types: &[String]) -> Result<Vec<String>, DecodeError> {
    if types.is_empty() {
        return Err(DecodeError::invalid("eventTypes must not be empty"));
    }
    Ok(types.to_vec())
}

/// Decode a duplex socket frame.
pub fn from_socket(frame: &SocketFrame) -> Result<SocketRequest, DecodeError> {
    let command = match frame.frame_type.as_str() {
        "ping" => return Ok(SocketRequest::Ping),
        "task_init" => {
            let p: TaskInitPayload = payload(frame)?;
            let (text, images) = text_or_images(p.task.as_ref(), &p.images, "task_init")?;
            BridgeCommand::StartTask { text, images }
        }
        "task_resume" => BridgeCommand::ResumeLatestTask,
        "task_response" => {
            let p: TaskResponsePayload = payload(frame)?;
            let tag = required(p.response.as_ref(), "response")?;
            let response = AskResponse::parse(&tag)
                .ok_or_else(|| DecodeError::invalid(format!("unknown response kind: {tag}")))?;
            BridgeCommand::SubmitApprovalResponse {
                response,
                text: p.text,
                images: p.images,
            }
        }
        "user_input" => {
            let p: UserInputPayload = payload(frame)?;
            let (text, images) = text_or_images(p.text.as_ref(), &p.images, "user_input")?;
            BridgeCommand::SendUserInput { text, images }
        }
        "options_response" => {
            let p: OptionsResponsePayload = payload(frame)?;
            BridgeCommand::SubmitOptionsResponse {
                option: required(p.selected_option.as_ref(), "selectedOption")?,
            }
        }
        "task_cancel" => BridgeCommand::CancelTask,
        "task_clear" => BridgeCommand::ClearTask,
        "task_delete" => {
            let p: TaskDeletePayload = payload(frame)?;
            let id = required(p.task_id.as_ref().or(frame.task_id.as_ref()), "taskId")?;
            BridgeCommand::DeleteTaskById {
                task_id: TaskId::from(id),
            }
        }
        "state_request" => BridgeCommand::RequestState,
        "settings_update" => {
            let update: SettingsUpdate = payload(frame)?;
            if update.is_empty() {
                return Err(DecodeError::invalid("settings_update changes nothing"));
            }
            BridgeCommand::UpdateSettings(update)
        }
        "chat_mode_update" => {
            let p: ChatModePayload = payload(frame)?;
            let mode = match required(p.mode.as_ref(), "mode")?.as_str() {
                "plan" => ChatMode::Plan,
                "act" => ChatMode::Act,
                other => return Err(DecodeError::invalid(format!("unknown chat mode: {other}"))),
            };
            BridgeCommand::UpdateSettings(SettingsUpdate {
                api_configuration: None,
                chat_mode: Some(mode),
            })
        }
        "event_subscribe" => {
            let p: SubscribePayload = payload(frame)?;
            BridgeCommand::Subscribe {
                event_types: event_types(&p.event_types)?,
            }
        }
        "event_unsubscribe" => BridgeCommand::Unsubscribe,
        "file_open" => {
            let p: FileOpenPayload = payload(frame)?;
            BridgeCommand::OpenFile {
                path: required(p.file_path.as_ref(), "filePath")?,
            }
        }
        "image_open" => {
            let p: ImageOpenPayload = payload(frame)?;
            BridgeCommand::OpenImage {
                path: required(p.image_path.as_ref(), "imagePath")?,
            }
        }
        "mention_open" => {
            let p: MentionOpenPayload = payload(frame)?;
            BridgeCommand::OpenMention {
                mention: required(p.mention.as_ref(), "mention")?,
            }
        }
        "checkpoint_diff" => {
            let p: CheckpointDiffPayload = payload(frame)?;
            BridgeCommand::CheckpointDiff {
                message_ts: message_ts(p.message_ts)?,
                since_last_completion: p.see_new_changes_since_last_task_completion,
            }
        }
        "checkpoint_restore" => {
            let p: CheckpointRestorePayload = payload(frame)?;
            checkpoint_restore(p.message_ts, p.restore_type.as_ref())?
        }
        "check_latest_changes" => BridgeCommand::CheckLatestChanges,
        other => return Err(DecodeError::UnknownType(other.to_owned())),
    };
    Ok(SocketRequest::Command(command))
}

fn ask_response(kind: AskResponseType) -> Result<AskResponse, DecodeError> {
    match kind {
        AskResponseType::MessageResponse => Ok(AskResponse::MessageResponse),
        AskResponseType::YesButtonClicked => Ok(AskResponse::YesButtonClicked),
        AskResponseType::NoButtonClicked => Ok(AskResponse::NoButtonClicked),
        AskResponseType::Unspecified => Err(DecodeError::invalid("askResponseType is required")),
    }
}

fn text_request(req: &TextRequest, what: &str) -> Result<(String, Vec<String>), DecodeError> {
    text_or_images(req.text.as_ref(), &req.images, what)
}

/// Decode a streaming RPC request.
pub fn from_control(req: &CommandRequest) -> Result<BridgeCommand, DecodeError> {
    Ok(match &req.command {
        ControlCommand::StartTask(r) => {
            let (text, images) = text_request(r, "startTask")?;
            BridgeCommand::StartTask { text, images }
        }
        ControlCommand::ResumeLatestTask(_) => BridgeCommand::ResumeLatestTask,
        ControlCommand::SendUserInput(r) => {
            let (text, images) = text_request(r, "sendUserInput")?;
            BridgeCommand::SendUserInput { text, images }
        }
        ControlCommand::SubmitAskResponse(r) => BridgeCommand::SubmitApprovalResponse {
            response: ask_response(r.ask_response_type)?,
            text: r.text.clone(),
            images: r.images.clone(),
        },
        ControlCommand::SubmitOptionsResponse(r) => BridgeCommand::SubmitOptionsResponse {
            option: required(r.selected_option.as_ref(), "selectedOption")?,
        },
        ControlCommand::CancelTask(_) => BridgeCommand::CancelTask,
        ControlCommand::ClearTask(_) => BridgeCommand::ClearTask,
        ControlCommand::DeleteTaskWithId(r) => BridgeCommand::DeleteTaskById {
            task_id: TaskId::from(required(r.task_id.as_ref(), "taskId")?),
        },
        ControlCommand::GetLatestState(_) => BridgeCommand::RequestState,
        ControlCommand::UpdateSettings(r) => BridgeCommand::UpdateSettings(settings_from_wire(r)?),
        ControlCommand::Subscribe(r) => BridgeCommand::Subscribe {
            event_types: event_types(&r.event_types)?,
        },
        ControlCommand::Unsubscribe(_) => BridgeCommand::Unsubscribe,
        ControlCommand::OpenFile(r) => BridgeCommand::OpenFile {
            path: required(r.file_path.as_ref(), "filePath")?,
        },
        ControlCommand::OpenImage(r) => BridgeCommand::OpenImage {
            path: required(r.image_path.as_ref(), "imagePath")?,
        },
        ControlCommand::OpenMention(r) => BridgeCommand::OpenMention {
            mention: required(r.mention.as_ref(), "mention")?,
        },
        ControlCommand::CheckpointDiff(r) => BridgeCommand::CheckpointDiff {
            message_ts: message_ts(r.message_ts)?,
            since_last_completion: r.see_new_changes_since_last_task_completion,
        },
        ControlCommand::CheckpointRestore(r) => {
            checkpoint_restore(r.message_ts, r.restore_type.as_ref())?
        }
        ControlCommand::CheckLatestChanges(_) => BridgeCommand::CheckLatestChanges,
    })
}
