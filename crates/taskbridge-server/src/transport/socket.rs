//! Duplex socket channel (`/ws`).

use serde_json::{Map, Value, json};
use taskbridge_core::ClientId;
use taskbridge_core::errors::INVALID_PARAMS;
use taskbridge_protocol::errors::ErrorBody;
use taskbridge_protocol::translate::{SocketRequest, from_socket};
use taskbridge_protocol::wire::SocketFrame;
use tracing::debug;

use super::encode;
use crate::dispatch::OutboundEvent;
use crate::router::{BridgeService, CommandReply};

/// Features advertised in the greeting.
pub const SUPPORTED_FEATURES: &[&str] =
    &["event_subscription", "state_resync", "message_reconciliation"];

/// The `connected` frame sent before anything else.
pub fn greeting(client_id: &ClientId, server_version: &str) -> Option<String> {
    encode(&SocketFrame::event(
        "connected",
        None,
        json!({
            "clientId": client_id,
            "serverVersion": server_version,
            "supportedFeatures": SUPPORTED_FEATURES,
        }),
    ))
}

/// Decode one inbound frame, run it, and render the replies.
pub async fn handle_frame(
    service: &BridgeService,
    client_id: &ClientId,
    text: &str,
) -> Vec<String> {
    let frame: SocketFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(error) => {
            debug!(%error, "malformed socket frame");
            let body = ErrorBody::new(
                INVALID_PARAMS,
                format!("malformed frame: {error}"),
                "validation_error",
            );
            return encode(&SocketFrame::error(None, &body)).into_iter().collect();
        }
    };

    let request = match from_socket(&frame) {
        Ok(request) => request,
        Err(error) => {
            debug!(frame_type = %frame.frame_type, %error, "socket frame rejected");
            return encode(&SocketFrame::error(frame.id, &ErrorBody::from(&error)))
                .into_iter()
                .collect();
        }
    };

    let frames = match request {
        SocketRequest::Ping => vec![pong(&frame)],
        SocketRequest::Command(command) => match service.handle_command(client_id, command).await {
            Ok(reply) => reply_frames(&frame, reply),
            Err(error) => vec![SocketFrame::error(frame.id.clone(), &ErrorBody::from(&error))],
        },
    };
    frames.iter().filter_map(encode).collect()
}

fn pong(frame: &SocketFrame) -> SocketFrame {
    SocketFrame {
        frame_type: "ping".into(),
        id: frame.id.clone(),
        task_id: None,
        payload: Some(json!({
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "hasEngine": true,
        })),
    }
}

fn reply_frames(request: &SocketFrame, reply: CommandReply) -> Vec<SocketFrame> {
    let id = request.id.clone();
    let frame_type = request.frame_type.as_str();
    match reply {
        CommandReply::Ack => vec![SocketFrame::success(frame_type, id, Value::Object(Map::new()))],
        CommandReply::TaskStarted { task_id, version } => {
            let ack = SocketFrame::success(
                frame_type,
                id,
                json!({ "taskId": task_id, "version": version }),
            );
            let event = OutboundEvent::TaskStarted { task_id, version };
            std::iter::once(ack).chain(event.to_socket().ok()).collect()
        }
        CommandReply::Changes { has_changes } => vec![SocketFrame::success(
            frame_type,
            id,
            json!({ "hasChanges": has_changes }),
        )],
        CommandReply::TaskResumed { task_id, version } => vec![SocketFrame::success(
            frame_type,
            id,
            json!({ "taskId": task_id, "version": version }),
        )],
        CommandReply::State(state) => match serde_json::to_value(&state) {
            Ok(state) => vec![SocketFrame::success(frame_type, id, json!({ "state": state }))],
            Err(error) => {
                let body = ErrorBody::new(
                    taskbridge_core::errors::TRANSLATION_ERROR,
                    format!("state could not be encoded: {error}"),
                    "translation_error",
                );
                vec![SocketFrame::error(id, &body)]
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskbridge_core::engine::NoopHost;
    use taskbridge_core::engine::memory::InMemoryEngine;
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::BridgeConfig;
    use crate::transport::connection::{ClientConnection, Flavor};

    fn make_service() -> (BridgeService, mpsc::Receiver<Arc<String>>) {
        let service = BridgeService::new(
            Arc::new(InMemoryEngine::new("3.1.0")),
            Arc::new(NoopHost),
            BridgeConfig::default(),
        );
        let (tx, rx) = mpsc::channel(16);
        service
            .connect(Arc::new(ClientConnection::new(ClientId::from("c1"), Flavor::Socket, tx)))
            .unwrap();
        (service, rx)
    }

    async fn send(service: &BridgeService, frame: Value) -> Vec<Value> {
        handle_frame(service, &ClientId::from("c1"), &frame.to_string())
            .await
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    #[test]
    fn greeting_shape() {
        let frame = greeting(&ClientId::from("c1"), "0.4.0").unwrap();
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["payload"]["clientId"], "c1");
        assert_eq!(json["payload"]["serverVersion"], "0.4.0");
        assert_eq!(json["payload"]["supportedFeatures"][0], "event_subscription");
    }

    #[tokio::test]
    async fn task_init_replies_and_announces() {
        let (service, _rx) = make_service();
        let frames = send(
            &service,
            json!({"type": "task_init", "id": "r1", "payload": {"task": "build a snake game"}}),
        )
        .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["type"], "task_init");
        assert_eq!(frames[0]["id"], "r1");
        assert_eq!(frames[0]["payload"]["success"], true);
        assert_eq!(frames[0]["payload"]["taskId"], "t1");
        assert_eq!(frames[1]["type"], "task_started");
        assert_eq!(frames[1]["payload"]["version"], "3.1.0");
    }

    #[tokio::test]
    async fn ping_answers_without_router() {
        let (service, _rx) = make_service();
        let frames = send(&service, json!({"type": "ping", "id": "p1"})).await;
        assert_eq!(frames[0]["type"], "ping");
        assert_eq!(frames[0]["id"], "p1");
        assert_eq!(frames[0]["payload"]["hasEngine"], true);
        assert!(frames[0]["payload"]["timestamp"].is_i64());
        assert_eq!(service.stats().errors, 0);
    }

    #[tokio::test]
    async fn unknown_type_rejected() {
        let (service, _rx) = make_service();
        let frames = send(&service, json!({"type": "auth_token", "id": "x"})).await;
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["id"], "x");
        assert_eq!(frames[0]["payload"]["success"], false);
        assert_eq!(frames[0]["payload"]["code"], "UNKNOWN_MESSAGE_TYPE");
    }

    #[tokio::test]
    async fn malformed_json_rejected() {
        let (service, _rx) = make_service();
        let frames = handle_frame(&service, &ClientId::from("c1"), "{not json").await;
        let json: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(json["payload"]["code"], "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn missing_binding_reports_code() {
        let (service, _rx) = make_service();
        let frames = send(&service, json!({"type": "task_cancel", "id": "c"})).await;
        assert_eq!(frames[0]["payload"]["code"], "NO_ACTIVE_TASK");
        assert_eq!(frames[0]["payload"]["kind"], "no_active_task");
    }

    #[tokio::test]
    async fn state_request_carries_state() {
        let (service, _rx) = make_service();
        let frames = send(&service, json!({"type": "state_request", "id": "s"})).await;
        assert_eq!(frames[0]["payload"]["success"], true);
        assert_eq!(frames[0]["payload"]["state"]["version"], "3.1.0");
    }

    #[tokio::test]
    async fn latest_changes_carries_answer() {
        let (service, _rx) = make_service();
        let _ = send(&service, json!({"type": "task_init", "payload": {"task": "build"}})).await;
        let frames = send(&service, json!({"type": "check_latest_changes", "id": "k"})).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "check_latest_changes");
        assert_eq!(frames[0]["id"], "k");
        assert_eq!(frames[0]["payload"]["success"], true);
        assert_eq!(frames[0]["payload"]["hasChanges"], false);
    }
}
