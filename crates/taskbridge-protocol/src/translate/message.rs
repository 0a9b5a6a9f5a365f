//! Engine message to [`WireMessage`].

use serde_json::{Map, Value};
use taskbridge_core::message::{AskType, EngineMessage, MessageType, SayType};
use tracing::warn;

use super::body::{
    self, ApiReqInfo, BrowserAction, BrowserActionResult, McpUse, MessageBody, ToolUse,
};
use crate::wire::message::{
    ApiReqInfoPayload, AskKind, BrowserActionPayload, BrowserActionResultPayload, BrowserActionType,
    CancelReason, McpRequestType, McpServerPayload, MessagePayload, PlanModeResponsePayload,
    QuestionPayload, SayKind, ToolPayload, ToolType, WireMessage, WireMessageType,
};

/// Translate one engine message.
///
/// Returns `None` only when the message has no timestamp. Payload problems
/// never fail: the message is still produced, carrying the raw text in the
/// generic `text` field.
pub fn to_wire(msg: &EngineMessage) -> Option<WireMessage> {
    let Some(ts) = msg.ts else {
        warn!(subtype = msg.subtype(), "message without timestamp cannot be translated");
        return None;
    };
    Some(encode(ts, msg, body::decode(msg)))
}

/// Build the wire message from an already decoded body.
pub fn encode(ts: i64, msg: &EngineMessage, body: MessageBody) -> WireMessage {
    let payload = payload_for(body, msg.text_or_empty());
    let text = if payload.is_some() { None } else { msg.text.clone() };
    WireMessage {
        ts,
        message_type: match msg.message_type {
            MessageType::Ask => WireMessageType::Ask,
            MessageType::Say => WireMessageType::Say,
        },
        ask_type: msg.ask_type().map_or(AskKind::Unspecified, ask_kind),
        say_type: msg.say_type().map_or(SayKind::Unspecified, say_kind),
        text,
        reasoning: msg.reasoning.clone(),
        images: msg.images.clone(),
        partial: msg.is_partial(),
        last_checkpoint_hash: msg.last_checkpoint_hash.clone(),
        is_checkpoint_checked_out: msg.is_checkpoint_checked_out.unwrap_or(false),
        is_operation_outside_workspace: msg.is_operation_outside_workspace.unwrap_or(false),
        conversation_history_index: msg.conversation_history_index,
        payload,
    }
}

/// Wire ask enum. Total over [`AskType`].
pub fn ask_kind(ask: AskType) -> AskKind {
    match ask {
        AskType::Followup => AskKind::Followup,
        AskType::PlanModeRespond => AskKind::PlanModeRespond,
        AskType::Command => AskKind::Command,
        AskType::CommandOutput => AskKind::CommandOutput,
        AskType::CompletionResult => AskKind::CompletionResult,
        AskType::Tool => AskKind::Tool,
        AskType::ApiReqFailed => AskKind::ApiReqFailed,
        AskType::ResumeTask => AskKind::ResumeTask,
        AskType::ResumeCompletedTask => AskKind::ResumeCompletedTask,
        AskType::MistakeLimitReached => AskKind::MistakeLimitReached,
        AskType::AutoApprovalMaxReqReached => AskKind::AutoApprovalMaxReqReached,
        AskType::BrowserActionLaunch => AskKind::BrowserActionLaunch,
        AskType::UseMcpServer => AskKind::UseMcpServer,
        AskType::NewTask => AskKind::NewTask,
        AskType::Condense => AskKind::Unspecified,
    }
}

/// Wire say enum. Total over [`SayType`].
pub fn say_kind(say: SayType) -> SayKind {
    match say {
        SayType::Task => SayKind::SayTask,
        SayType::Error => SayKind::SayError,
        SayType::ApiReqStarted => SayKind::ApiReqStarted,
        SayType::ApiReqFinished => SayKind::ApiReqFinished,
        SayType::ApiReqRetried => SayKind::ApiReqRetried,
        SayType::Text => SayKind::SayText,
        SayType::Reasoning => SayKind::Reasoning,
        SayType::CompletionResult => SayKind::SayCompletionResult,
        SayType::UserFeedback => SayKind::UserFeedback,
        SayType::UserFeedbackDiff => SayKind::UserFeedbackDiff,
        SayType::Command => SayKind::SayCommand,
        SayType::CommandOutput => SayKind::SayCommandOutput,
        SayType::Tool => SayKind::SayTool,
        SayType::ShellIntegrationWarning => SayKind::ShellIntegrationWarning,
        SayType::BrowserActionLaunch => SayKind::SayBrowserActionLaunch,
        SayType::BrowserAction => SayKind::BrowserAction,
        SayType::BrowserActionResult => SayKind::BrowserActionResult,
        SayType::McpServerRequestStarted => SayKind::McpServerRequestStarted,
        SayType::McpServerResponse => SayKind::McpServerResponse,
        SayType::UseMcpServer => SayKind::SayUseMcpServer,
        SayType::DiffError => SayKind::DiffError,
        SayType::DeletedApiReqs => SayKind::DeletedApiReqs,
        SayType::ClineignoreError => SayKind::IgnoreError,
        SayType::CheckpointCreated => SayKind::CheckpointCreated,
        SayType::LoadMcpDocumentation => SayKind::LoadMcpDocumentation,
    }
}

fn payload_for(body: MessageBody, raw: &str) -> Option<MessagePayload> {
    use MessagePayload as P;

    Some(match body {
        MessageBody::AskFollowup(q) => P::AskQuestion(QuestionPayload {
            question: q.question.unwrap_or_default(),
            options: q.options,
        }),
        MessageBody::AskPlanModeRespond(p) => P::AskPlanModeResponse(PlanModeResponsePayload {
            response: p.response.unwrap_or_default(),
            options: p.options,
        }),
        MessageBody::AskCommand(command_text) => P::AskCommand { command_text },
        MessageBody::AskCommandOutput(output_text) => P::AskCommandOutput { output_text },
        MessageBody::AskCompletionResult(result_text) => P::AskCompletionResult { result_text },
        MessageBody::AskTool(tool) => ask_tool(tool, raw),
        MessageBody::AskApiReqFailed(error_message) => P::AskApiReqFailed { error_message },
        MessageBody::AskResumeTask(task_id) => P::AskResumeTask { task_id },
        MessageBody::AskResumeCompletedTask(task_id) => P::AskResumeCompletedTask { task_id },
        MessageBody::AskMistakeLimitReached => P::AskMistakeLimitReached {},
        MessageBody::AskAutoApprovalMaxReqReached => P::AskAutoApprovalMaxReqReached {},
        MessageBody::AskBrowserActionLaunch(url) => P::AskBrowserActionLaunch { url },
        MessageBody::AskUseMcpServer(mcp) => P::AskUseMcpServer(mcp_payload(mcp)),
        MessageBody::AskNewTask { context } => P::AskNewTask { context },
        MessageBody::SayTask(task_description) => P::SayTask { task_description },
        MessageBody::SayError(error_message) => P::SayError { error_message },
        MessageBody::SayApiReq(info) => P::SayApiReqInfo(api_req_payload(info)),
        MessageBody::SayText(text_content) => P::SayText { text_content },
        MessageBody::SayReasoning(reasoning_text) => P::SayReasoning { reasoning_text },
        MessageBody::SayCompletionResult { text, has_changes } => P::SayCompletionResult {
            result_text: text,
            has_changes,
        },
        MessageBody::SayUserFeedback(feedback_text) => P::SayUserFeedback { feedback_text },
        MessageBody::SayUserFeedbackDiff(diff_content) => P::SayUserFeedbackDiff { diff_content },
        MessageBody::SayCommand(command_text) => P::SayCommand { command_text },
        MessageBody::SayCommandOutput(output_text) => P::SayCommandOutput { output_text },
        MessageBody::SayTool(tool) => P::SayTool(tool_payload(tool, raw)),
        MessageBody::SayShellIntegrationWarning(warning_message) => {
            P::SayShellIntegrationWarning { warning_message }
        }
        MessageBody::SayBrowserActionLaunch(url) => P::SayBrowserActionLaunch { url },
        MessageBody::SayBrowserAction(action) => {
            P::SayBrowserAction(browser_action_payload(action))
        }
        MessageBody::SayBrowserActionResult(result) => {
            P::SayBrowserActionResult(browser_result_payload(result))
        }
        MessageBody::SayMcpServerRequestStarted(server_name) => {
            P::SayMcpServerRequestStarted { server_name }
        }
        MessageBody::SayMcpServerResponse(response_content) => {
            P::SayMcpServerResponse { response_content }
        }
        MessageBody::SayUseMcpServer(mcp) => P::SayUseMcpServer {
            details: mcp_payload(mcp),
        },
        MessageBody::SayDiffError { error, path } => P::SayDiffError {
            error_message: error,
            path,
        },
        MessageBody::SayDeletedApiReqs { count } => P::SayDeletedApiReqs { count },
        MessageBody::SayIgnoreError(error_message) => P::SayIgnoreError { error_message },
        MessageBody::SayCheckpointCreated(checkpoint_hash) => {
            P::SayCheckpointCreated { checkpoint_hash }
        }
        MessageBody::SayLoadMcpDocumentation => P::SayLoadMcpDocumentation {},
        MessageBody::Fallback => return None,
    })
}

// ── Tools ───────────────────────────────────────────────────────────

/// Tool asks that are really a different ask get their own payload case.
fn ask_tool(tool: ToolUse, raw: &str) -> MessagePayload {
    match tool.tool.as_str() {
        "attempt_completion" => MessagePayload::AskCompletionResult {
            result_text: tool.result.unwrap_or_default(),
        },
        "ask_followup_question" => MessagePayload::AskQuestion(QuestionPayload {
            question: tool.question.unwrap_or_default(),
            options: tool.options.unwrap_or_default(),
        }),
        "plan_mode_respond" => MessagePayload::AskPlanModeResponse(PlanModeResponsePayload {
            response: tool.response.unwrap_or_default(),
            options: tool.options.unwrap_or_default(),
        }),
        "new_task" => MessagePayload::AskNewTask {
            context: tool.context.unwrap_or_default(),
        },
        "browser_action" if tool.action.as_deref() == Some("launch") => {
            MessagePayload::AskBrowserActionLaunch {
                url: tool.url.unwrap_or_default(),
            }
        }
        "use_mcp_tool" | "access_mcp_resource" => MessagePayload::AskUseMcpServer(McpServerPayload {
            server_name: tool.server_name.clone().unwrap_or_default(),
            request_type: mcp_request_type(&tool.tool),
            arguments_json: tool.arguments_json(),
            tool_name: tool.tool_name,
            uri: tool.uri,
        }),
        _ => MessagePayload::AskTool(tool_payload(tool, raw)),
    }
}

fn tool_type(tool: &ToolUse) -> ToolType {
    match tool.tool.as_str() {
        "write_to_file" | "newFileCreated" => ToolType::NewFileCreated,
        "replace_in_file" | "editedExistingFile" => ToolType::EditedExistingFile,
        "read_file" | "readFile" => ToolType::ReadFile,
        "list_files" if tool.is_recursive() => ToolType::ListFilesRecursive,
        "list_files" | "listFilesTopLevel" => ToolType::ListFilesTopLevel,
        "listFilesRecursive" => ToolType::ListFilesRecursive,
        "list_code_definition_names" | "listCodeDefinitionNames" => {
            ToolType::ListCodeDefinitionNames
        }
        "search_files" | "searchFiles" => ToolType::SearchFiles,
        "execute_command" => ToolType::ExecuteCommand,
        "browser_action" => ToolType::BrowserAction,
        _ => ToolType::Unspecified,
    }
}

fn tool_payload(tool: ToolUse, raw: &str) -> ToolPayload {
    let tool_type = tool_type(&tool);
    let content = match tool_type {
        ToolType::ExecuteCommand => tool.command.clone().or(tool.content.clone()),
        ToolType::BrowserAction => Some(browser_params(&tool)),
        ToolType::Unspecified => tool.content.clone().or_else(|| Some(raw.to_owned())),
        _ => tool.content.clone(),
    };
    ToolPayload {
        tool_type,
        path: tool.path,
        content,
        diff: tool.diff,
        regex: tool.regex,
        file_pattern: tool.file_pattern,
        operation_is_located_in_workspace: tool.in_workspace.unwrap_or(false),
    }
}

fn browser_params(tool: &ToolUse) -> String {
    let mut params = Map::new();
    for (key, value) in [
        ("action", &tool.action),
        ("url", &tool.url),
        ("coordinate", &tool.coordinate),
        ("text", &tool.text),
    ] {
        if let Some(v) = value {
            let _ = params.insert(key.to_owned(), Value::String(v.clone()));
        }
    }
    Value::Object(params).to_string()
}

// ── Small payloads ──────────────────────────────────────────────────

fn mcp_request_type(tag: &str) -> McpRequestType {
    match tag {
        "use_mcp_tool" => McpRequestType::UseMcpTool,
        "access_mcp_resource" => McpRequestType::AccessMcpResource,
        _ => McpRequestType::Unspecified,
    }
}

fn mcp_payload(mcp: McpUse) -> McpServerPayload {
    McpServerPayload {
        server_name: mcp.server_name.unwrap_or_default(),
        request_type: mcp
            .request_type
            .as_deref()
            .map_or(McpRequestType::Unspecified, mcp_request_type),
        tool_name: mcp.tool_name,
        arguments_json: mcp.arguments,
        uri: mcp.uri,
    }
}

fn api_req_payload(info: ApiReqInfo) -> ApiReqInfoPayload {
    ApiReqInfoPayload {
        request: info.request,
        tokens_in: info.tokens_in.unwrap_or(0),
        tokens_out: info.tokens_out.unwrap_or(0),
        cache_writes: info.cache_writes.unwrap_or(0),
        cache_reads: info.cache_reads.unwrap_or(0),
        cost: info.cost.unwrap_or(0.0),
        cancel_reason: match info.cancel_reason.as_deref() {
            Some("streaming_failed") => CancelReason::StreamingFailed,
            Some("user_cancelled") => CancelReason::UserCancelled,
            _ => CancelReason::Unspecified,
        },
        streaming_failed_message: info.streaming_failed_message,
    }
}

fn browser_action_payload(action: BrowserAction) -> BrowserActionPayload {
    BrowserActionPayload {
        action: match action.action.as_deref() {
            Some("launch") => BrowserActionType::Launch,
            Some("click") => BrowserActionType::Click,
            Some("type") => BrowserActionType::Type,
            Some("scroll_down") => BrowserActionType::ScrollDown,
            Some("scroll_up") => BrowserActionType::ScrollUp,
            Some("close") => BrowserActionType::Close,
            _ => BrowserActionType::Unspecified,
        },
        coordinate: action.coordinate,
        text: action.text,
    }
}

fn browser_result_payload(result: BrowserActionResult) -> BrowserActionResultPayload {
    BrowserActionResultPayload {
        screenshot: result.screenshot,
        logs: result.logs,
        current_url: result.current_url,
        current_mouse_position: result.current_mouse_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn make_ask(ask: AskType, text: &str) -> EngineMessage {
        EngineMessage::ask(1000, ask, text)
    }

    fn make_say(say: SayType, text: &str) -> EngineMessage {
        EngineMessage::say(1000, say, text)
    }

    #[test]
    fn missing_ts_yields_none() {
        let mut msg = make_say(SayType::Text, "hi");
        msg.ts = None;
        assert!(to_wire(&msg).is_none());
    }

    #[test]
    fn typed_payload_clears_text() {
        let wire = to_wire(&make_say(SayType::Text, "Sure, I'll build a snake game.")).unwrap();
        assert!(wire.text.is_none());
        assert_eq!(wire.say_type, SayKind::SayText);
        assert_eq!(wire.ask_type, AskKind::Unspecified);
        assert_eq!(
            wire.payload,
            Some(MessagePayload::SayText {
                text_content: "Sure, I'll build a snake game.".into()
            })
        );
    }

    #[test]
    fn malformed_json_keeps_metadata() {
        let msg = make_ask(AskType::Followup, "{\"question\":").with_partial(true);
        let wire = to_wire(&msg).unwrap();
        assert_eq!(wire.ts, 1000);
        assert!(wire.partial);
        assert_eq!(wire.message_type, WireMessageType::Ask);
        assert_eq!(wire.ask_type, AskKind::Followup);
        assert!(wire.payload.is_none());
        assert_eq!(wire.text.as_deref(), Some("{\"question\":"));
    }

    #[test]
    fn metadata_defaults_are_false() {
        let wire = to_wire(&make_say(SayType::Text, "x")).unwrap();
        assert!(!wire.is_checkpoint_checked_out);
        assert!(!wire.is_operation_outside_workspace);
        assert!(wire.images.is_empty());
    }

    #[test]
    fn followup_frame_snapshot() {
        let wire = to_wire(&make_ask(
            AskType::Followup,
            r#"{"question":"Which framework?","options":["react","vue"]}"#,
        ))
        .unwrap();
        insta::assert_json_snapshot!(wire, @r#"
        {
          "ts": 1000,
          "type": "ASK",
          "askType": "FOLLOWUP",
          "sayType": "SAY_TYPE_UNSPECIFIED",
          "images": [],
          "partial": false,
          "isCheckpointCheckedOut": false,
          "isOperationOutsideWorkspace": false,
          "askQuestion": {
            "question": "Which framework?",
            "options": [
              "react",
              "vue"
            ]
          }
        }
        "#);
    }

    #[test]
    fn tool_ask_remaps_to_completion() {
        let wire = to_wire(&make_ask(
            AskType::Tool,
            r#"{"tool":"attempt_completion","result":"All done"}"#,
        ))
        .unwrap();
        assert_eq!(
            wire.payload,
            Some(MessagePayload::AskCompletionResult {
                result_text: "All done".into()
            })
        );
    }

    #[test]
    fn tool_ask_remaps_browser_launch_only() {
        let launch = to_wire(&make_ask(
            AskType::Tool,
            r#"{"tool":"browser_action","action":"launch","url":"http://localhost:3000"}"#,
        ))
        .unwrap();
        assert_matches!(
            launch.payload,
            Some(MessagePayload::AskBrowserActionLaunch { ref url })
                if url == "http://localhost:3000"
        );

        let click = to_wire(&make_ask(
            AskType::Tool,
            r#"{"tool":"browser_action","action":"click","coordinate":"10,20"}"#,
        ))
        .unwrap();
        let t = assert_matches!(click.payload, Some(MessagePayload::AskTool(t)) => t);
        assert_eq!(t.tool_type, ToolType::BrowserAction);
        assert_eq!(
            t.content.as_deref(),
            Some(r#"{"action":"click","coordinate":"10,20"}"#)
        );
    }

    #[test]
    fn tool_ask_mcp() {
        let wire = to_wire(&make_ask(
            AskType::Tool,
            concat!(
                r#"{"tool":"use_mcp_tool","server_name":"weather","tool_name":"forecast","#,
                r#""arguments":"{\"city\":\"Oslo\"}"}"#,
            ),
        ))
        .unwrap();
        let m = assert_matches!(wire.payload, Some(MessagePayload::AskUseMcpServer(m)) => m);
        assert_eq!(m.server_name, "weather");
        assert_eq!(m.request_type, McpRequestType::UseMcpTool);
        assert_eq!(m.arguments_json.as_deref(), Some(r#"{"city":"Oslo"}"#));
    }

    #[test]
    fn tool_types_by_name() {
        let cases = [
            (
                r#"{"tool":"write_to_file","path":"a.rs","content":"fn main(){}"}"#,
                ToolType::NewFileCreated,
            ),
            (
                r#"{"tool":"editedExistingFile","path":"a.rs","diff":"-a\n+b"}"#,
                ToolType::EditedExistingFile,
            ),
            (r#"{"tool":"read_file","path":"a.rs"}"#, ToolType::ReadFile),
            (
                r#"{"tool":"list_files","path":".","recursive":"true"}"#,
                ToolType::ListFilesRecursive,
            ),
            (r#"{"tool":"list_files","path":"."}"#, ToolType::ListFilesTopLevel),
            (
                r#"{"tool":"listCodeDefinitionNames","path":"src"}"#,
                ToolType::ListCodeDefinitionNames,
            ),
            (r#"{"tool":"search_files","regex":"todo"}"#, ToolType::SearchFiles),
            (r#"{"tool":"summon_dragon"}"#, ToolType::Unspecified),
        ];
        for (text, expected) in cases {
            let wire = to_wire(&make_say(SayType::Tool, text)).unwrap();
            assert_matches!(
                wire.payload,
                Some(MessagePayload::SayTool(ref t)) if t.tool_type == expected,
                "{text}"
            );
        }
    }

    #[test]
    fn execute_command_content_is_command() {
        let wire = to_wire(&make_ask(
            AskType::Tool,
            r#"{"tool":"execute_command","command":"cargo fmt"}"#,
        ))
        .unwrap();
        assert_matches!(
            wire.payload,
            Some(MessagePayload::AskTool(ref t)) if t.content.as_deref() == Some("cargo fmt")
        );
    }

    #[test]
    fn unknown_tool_keeps_raw_params() {
        let raw = r#"{"tool":"summon_dragon","color":"red"}"#;
        let wire = to_wire(&make_ask(AskType::Tool, raw)).unwrap();
        assert_matches!(
            wire.payload,
            Some(MessagePayload::AskTool(ref t)) if t.content.as_deref() == Some(raw)
        );
    }

    #[test]
    fn api_req_defaults_to_zero() {
        let wire = to_wire(&make_say(
            SayType::ApiReqStarted,
            r#"{"request":"GET","tokensIn":12}"#,
        ))
        .unwrap();
        let info = assert_matches!(wire.payload, Some(MessagePayload::SayApiReqInfo(i)) => i);
        assert_eq!(info.tokens_in, 12);
        assert_eq!(info.tokens_out, 0);
        assert!(info.cost.abs() < f64::EPSILON);
        assert_eq!(info.cancel_reason, CancelReason::Unspecified);
    }

    #[test]
    fn api_req_cancel_reason() {
        let wire = to_wire(&make_say(
            SayType::ApiReqFinished,
            r#"{"cancelReason":"streaming_failed","streamingFailedMessage":"socket hang up"}"#,
        ))
        .unwrap();
        assert_matches!(
            wire.payload,
            Some(MessagePayload::SayApiReqInfo(ref info))
                if info.cancel_reason == CancelReason::StreamingFailed
        );
    }

    #[test]
    fn ignore_error_maps_to_ignore_kind() {
        let wire = to_wire(&make_say(SayType::ClineignoreError, ".env")).unwrap();
        assert_eq!(wire.say_type, SayKind::IgnoreError);
    }

    #[test]
    fn every_known_subtype_maps_to_specified_kind() {
        for ask in AskType::ALL {
            if *ask != AskType::Condense {
                assert_ne!(ask_kind(*ask), AskKind::Unspecified, "{ask}");
            }
        }
        for say in SayType::ALL {
            assert_ne!(say_kind(*say), SayKind::Unspecified, "{say}");
        }
    }

    proptest! {
        #[test]
        fn unknown_subtype_preserves_text(text in ".*", subtype in "[a-z_]{1,16}") {
            prop_assume!(SayType::parse(&subtype).is_none());
            let mut msg = make_say(SayType::Text, &text);
            msg.say = Some(subtype);
            let wire = to_wire(&msg).unwrap();
            prop_assert_eq!(wire.text.as_deref(), Some(text.as_str()));
            prop_assert_eq!(wire.say_type, SayKind::Unspecified);
            prop_assert_eq!(wire.ask_type, AskKind::Unspecified);
            prop_assert!(wire.payload.is_none());
        }

        #[test]
        fn malformed_tool_json_never_panics(text in ".*") {
            let wire = to_wire(&make_ask(AskType::Tool, &text)).unwrap();
            prop_assert_eq!(wire.ts, 1000);
            if wire.payload.is_none() {
                prop_assert_eq!(wire.text.as_deref(), Some(text.as_str()));
            }
        }
    }
}
