//! Streaming RPC channel (`/control`).
//!
//! Each inbound frame is a `CommandRequest`; every reply is an
//! `ExtensionMessage` whose `responseToRequestId` echoes the request id.

use serde_json::{Value, json};
use taskbridge_core::ClientId;
use taskbridge_core::errors::INVALID_PARAMS;
use taskbridge_protocol::errors::ErrorBody;
use taskbridge_protocol::translate::from_control;
use taskbridge_protocol::wire::{
    CommandRequest, ExtensionMessage, ExtensionMessageType, ExtensionPayload,
};
use tracing::debug;

use super::encode;
use crate::router::{BridgeService, CommandReply};

/// Decode one inbound frame, run it, and render the reply.
pub async fn handle_frame(
    service: &BridgeService,
    client_id: &ClientId,
    text: &str,
) -> Vec<String> {
    encode(&respond(service, client_id, text).await).into_iter().collect()
}

async fn respond(service: &BridgeService, client_id: &ClientId, text: &str) -> ExtensionMessage {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => {
            debug!(%error, "malformed control frame");
            return error_reply(None, &invalid(format!("malformed frame: {error}")));
        }
    };
    let request_id = value
        .get("requestId")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let request: CommandRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(error) => {
            debug!(%error, "unrecognized control command");
            return error_reply(request_id, &invalid(format!("unrecognized command: {error}")));
        }
    };
    let command = match from_control(&request) {
        Ok(command) => command,
        Err(error) => return error_reply(request_id, &ErrorBody::from(&error)),
    };

    match service.handle_command(client_id, command).await {
        Ok(CommandReply::Ack) => ExtensionMessage::ack(request_id, request.command.key()),
        Ok(CommandReply::Changes { has_changes }) => {
            ExtensionMessage::changes(request_id, request.command.key(), has_changes)
        }
        Ok(
            CommandReply::TaskStarted { task_id, version }
            | CommandReply::TaskResumed { task_id, version },
        ) => {
            ExtensionMessage::new(
                ExtensionMessageType::TaskStarted,
                ExtensionPayload::TaskStarted {
                    task_id: task_id.to_string(),
                    version,
                },
            )
            .in_response_to(request_id)
        }
        Ok(CommandReply::State(state)) => {
            ExtensionMessage::new(ExtensionMessageType::State, ExtensionPayload::State(*state))
                .in_response_to(request_id)
        }
        Err(error) => error_reply(request_id, &ErrorBody::from(&error)),
    }
}

fn invalid(message: String) -> ErrorBody {
    ErrorBody::new(INVALID_PARAMS, message, "validation_error")
}

/// `ERROR` frame. The error code travels in `details.code`.
fn error_reply(request_id: Option<String>, body: &ErrorBody) -> ExtensionMessage {
    let mut details = json!({ "code": body.code });
    if let (Some(extra), Value::Object(map)) = (&body.details, &mut details) {
        let _ = map.insert("details".into(), extra.clone());
    }
    ExtensionMessage::new(
        ExtensionMessageType::Error,
        ExtensionPayload::ErrorMessage {
            message: body.message.clone(),
            details: Some(details),
            kind: body.kind.clone(),
        },
    )
    .in_response_to(request_id)
}
