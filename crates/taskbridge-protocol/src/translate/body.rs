//! Typed decoding of engine message bodies.
//!
//! Engine messages carry a subtype tag and a text field that, for many
//! subtypes, is an embedded JSON document. [`decode`] parses that text once
//! into a closed [`MessageBody`]; everything downstream matches on the enum.
//! Unknown subtypes and unparseable payloads become [`MessageBody::Fallback`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskbridge_core::message::{AskType, EngineMessage, SayType};
use tracing::warn;

/// Marker the engine appends to a completion result when files changed.
pub const HAS_CHANGES_MARKER: &str = "HAS_CHANGES";

/// `followup` question.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Question {
    /// Question text.
    pub question: Option<String>,
    /// Suggested answers.
    pub options: Vec<String>,
}

/// `plan_mode_respond` body.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanResponse {
    /// Response text.
    pub response: Option<String>,
    /// Suggested answers.
    pub options: Vec<String>,
}

/// A tool invocation, as the engine describes it in `ask:tool`/`say:tool`.
///
/// Raw tool-use parameters (`write_to_file`, `file_pattern`, ...) and the
/// engine's normalized names (`newFileCreated`, `filePattern`, ...) both
/// decode into this struct.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolUse {
    /// Tool name.
    pub tool: String,
    /// Target path.
    pub path: Option<String>,
    /// New file content.
    pub content: Option<String>,
    /// Diff to apply.
    pub diff: Option<String>,
    /// Search regex.
    pub regex: Option<String>,
    /// Search file glob.
    #[serde(alias = "filePattern")]
    pub file_pattern: Option<String>,
    /// `list_files` recursion flag; a bool or `"true"`/`"false"`.
    pub recursive: Option<Value>,
    /// Command line for `execute_command`.
    pub command: Option<String>,
    /// Browser action verb.
    pub action: Option<String>,
    /// Browser launch URL.
    pub url: Option<String>,
    /// Browser click coordinate.
    pub coordinate: Option<String>,
    /// Browser typed text.
    pub text: Option<String>,
    /// `attempt_completion` result.
    pub result: Option<String>,
    /// `ask_followup_question` question.
    pub question: Option<String>,
    /// Suggested answers.
    pub options: Option<Vec<String>>,
    /// `plan_mode_respond` response.
    pub response: Option<String>,
    /// `new_task` context.
    pub context: Option<String>,
    /// MCP server name.
    #[serde(alias = "serverName")]
    pub server_name: Option<String>,
    /// MCP tool name.
    #[serde(alias = "toolName")]
    pub tool_name: Option<String>,
    /// MCP arguments; a JSON string or object.
    pub arguments: Option<Value>,
    /// MCP resource URI.
    pub uri: Option<String>,
    /// Whether the target lies inside the workspace.
    #[serde(rename = "operationIsLocatedInWorkspace")]
    pub in_workspace: Option<bool>,
    /// Any other parameter.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ToolUse {
    /// Whether `list_files` was asked to recurse.
    pub fn is_recursive(&self) -> bool {
        match &self.recursive {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// MCP arguments as a JSON string.
    pub fn arguments_json(&self) -> Option<String> {
        self.arguments.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// MCP server use (`use_mcp_server`).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpUse {
    /// Server name.
    pub server_name: Option<String>,
    /// `use_mcp_tool` or `access_mcp_resource`.
    #[serde(rename = "type")]
    pub request_type: Option<String>,
    /// Tool name.
    pub tool_name: Option<String>,
    /// Arguments as a JSON string.
    pub arguments: Option<String>,
    /// Resource URI.
    pub uri: Option<String>,
}

/// API request accounting (`api_req_*`).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiReqInfo {
    /// Request summary.
    pub request: Option<String>,
    /// Input tokens.
    pub tokens_in: Option<u64>,
    /// Output tokens.
    pub tokens_out: Option<u64>,
    /// Cache write tokens.
    pub cache_writes: Option<u64>,
    /// Cache read tokens.
    pub cache_reads: Option<u64>,
    /// Cost.
    pub cost: Option<f64>,
    /// `streaming_failed` or `user_cancelled`.
    pub cancel_reason: Option<String>,
    /// Failure detail.
    pub streaming_failed_message: Option<String>,
}

/// Browser action (`say:browser_action`).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserAction {
    /// Verb.
    pub action: Option<String>,
    /// Click coordinate.
    pub coordinate: Option<String>,
    /// Typed text.
    pub text: Option<String>,
}

/// Browser action result.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserActionResult {
    /// Screenshot data URL.
    pub screenshot: Option<String>,
    /// Console logs.
    pub logs: Option<String>,
    /// Current page URL.
    pub current_url: Option<String>,
    /// Current mouse position.
    pub current_mouse_position: Option<String>,
}

/// The decoded body of one engine message.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    /// `ask:followup`.
    AskFollowup(Question),
    /// `ask:plan_mode_respond`.
    AskPlanModeRespond(PlanResponse),
    /// `ask:command`.
    AskCommand(String),
    /// `ask:command_output`.
    AskCommandOutput(String),
    /// `ask:completion_result`.
    AskCompletionResult(String),
    /// `ask:tool`.
    AskTool(ToolUse),
    /// `ask:api_req_failed`.
    AskApiReqFailed(String),
    /// `ask:resume_task`.
    AskResumeTask(String),
    /// `ask:resume_completed_task`.
    AskResumeCompletedTask(String),
    /// `ask:mistake_limit_reached`.
    AskMistakeLimitReached,
    /// `ask:auto_approval_max_req_reached`.
    AskAutoApprovalMaxReqReached,
    /// `ask:browser_action_launch`.
    AskBrowserActionLaunch(String),
    /// `ask:use_mcp_server`.
    AskUseMcpServer(McpUse),
    /// `ask:new_task`.
    AskNewTask {
        /// Context carried into the new task.
        context: String,
    },
    /// `say:task`.
    SayTask(String),
    /// `say:error`.
    SayError(String),
    /// `say:api_req_started|finished|retried`.
    SayApiReq(ApiReqInfo),
    /// `say:text`.
    SayText(String),
    /// `say:reasoning`.
    SayReasoning(String),
    /// `say:completion_result`.
    SayCompletionResult {
        /// Result text without the change marker.
        text: String,
        /// Whether the marker was present.
        has_changes: bool,
    },
    /// `say:user_feedback`.
    SayUserFeedback(String),
    /// `say:user_feedback_diff`.
    SayUserFeedbackDiff(String),
    /// `say:command`.
    SayCommand(String),
    /// `say:command_output`.
    SayCommandOutput(String),
    /// `say:tool`.
    SayTool(ToolUse),
    /// `say:shell_integration_warning`.
    SayShellIntegrationWarning(String),
    /// `say:browser_action_launch`.
    SayBrowserActionLaunch(String),
    /// `say:browser_action`.
    SayBrowserAction(BrowserAction),
    /// `say:browser_action_result`.
    SayBrowserActionResult(BrowserActionResult),
    /// `say:mcp_server_request_started`.
    SayMcpServerRequestStarted(String),
    /// `say:mcp_server_response`.
    SayMcpServerResponse(String),
    /// `say:use_mcp_server`.
    SayUseMcpServer(McpUse),
    /// `say:diff_error`.
    SayDiffError {
        /// Error text.
        error: String,
        /// Affected file.
        path: String,
    },
    /// `say:deleted_api_reqs`.
    SayDeletedApiReqs {
        /// How many requests were deleted.
        count: u64,
    },
    /// `say:clineignore_error`.
    SayIgnoreError(String),
    /// `say:checkpoint_created`.
    SayCheckpointCreated(String),
    /// `say:load_mcp_documentation`.
    SayLoadMcpDocumentation,
    /// No typed representation; the raw text is carried verbatim.
    Fallback,
}

/// Parse an embedded JSON document; empty text decodes as the default.
fn embedded<T: DeserializeOwned + Default>(text: &str) -> Result<T, serde_json::Error> {
    if text.trim().is_empty() {
        Ok(T::default())
    } else {
        serde_json::from_str(text)
    }
}

/// Decode an engine message into its typed body. Never fails.
pub fn decode(msg: &EngineMessage) -> MessageBody {
    let result = if let Some(ask) = msg.ask_type() {
        decode_ask(ask, msg)
    } else if let Some(say) = msg.say_type() {
        decode_say(say, msg)
    } else {
        warn!(
            subtype = msg.subtype(),
            ts = ?msg.ts,
            "unknown message subtype, using fallback text"
        );
        return MessageBody::Fallback;
    };

    result.unwrap_or_else(|err| {
        warn!(
            subtype = msg.subtype(),
            ts = ?msg.ts,
            error = %err,
            "payload decode failed, using fallback text"
        );
        MessageBody::Fallback
    })
}

fn decode_ask(ask: AskType, msg: &EngineMessage) -> Result<MessageBody, serde_json::Error> {
    let text = msg.text_or_empty();
    let owned = || text.to_owned();
    Ok(match ask {
        AskType::Followup => MessageBody::AskFollowup(embedded(text)?),
        AskType::PlanModeRespond => MessageBody::AskPlanModeRespond(embedded(text)?),
        AskType::Command => MessageBody::AskCommand(owned()),
        AskType::CommandOutput => MessageBody::AskCommandOutput(owned()),
        AskType::CompletionResult => MessageBody::AskCompletionResult(owned()),
        AskType::Tool => MessageBody::AskTool(embedded(text)?),
        AskType::ApiReqFailed => MessageBody::AskApiReqFailed(owned()),
        AskType::ResumeTask => MessageBody::AskResumeTask(owned()),
        AskType::ResumeCompletedTask => MessageBody::AskResumeCompletedTask(owned()),
        AskType::MistakeLimitReached => MessageBody::AskMistakeLimitReached,
        AskType::AutoApprovalMaxReqReached => MessageBody::AskAutoApprovalMaxReqReached,
        AskType::BrowserActionLaunch => MessageBody::AskBrowserActionLaunch(owned()),
        AskType::UseMcpServer => MessageBody::AskUseMcpServer(embedded(text)?),
        AskType::NewTask => {
            #[derive(Default, Deserialize)]
            #[serde(default)]
            struct NewTask {
                context: Option<String>,
            }
            let parsed: NewTask = embedded(text)?;
            MessageBody::AskNewTask {
                context: parsed.context.unwrap_or_default(),
            }
        }
        AskType::Condense => MessageBody::Fallback,
    })
}

fn decode_say(say: SayType, msg: &EngineMessage) -> Result<MessageBody, serde_json::Error> {
    let text = msg.text_or_empty();
    let owned = || text.to_owned();
    Ok(match say {
        SayType::Task => MessageBody::SayTask(owned()),
        SayType::Error => MessageBody::SayError(owned()),
        SayType::ApiReqStarted | SayType::ApiReqFinished | SayType::ApiReqRetried => {
            MessageBody::SayApiReq(embedded(text)?)
        }
        SayType::Text => MessageBody::SayText(owned()),
        SayType::Reasoning => {
            MessageBody::SayReasoning(msg.reasoning.clone().unwrap_or_else(owned))
        }
        SayType::CompletionResult => match text.trim_end().strip_suffix(HAS_CHANGES_MARKER) {
            Some(stripped) => MessageBody::SayCompletionResult {
                text: stripped.to_owned(),
                has_changes: true,
            },
            None => MessageBody::SayCompletionResult {
                text: owned(),
                has_changes: false,
            },
        },
        SayType::UserFeedback => MessageBody::SayUserFeedback(owned()),
        SayType::UserFeedbackDiff => MessageBody::SayUserFeedbackDiff(owned()),
        SayType::Command => MessageBody::SayCommand(owned()),
        SayType::CommandOutput => MessageBody::SayCommandOutput(owned()),
        SayType::Tool => MessageBody::SayTool(embedded(text)?),
        SayType::ShellIntegrationWarning => MessageBody::SayShellIntegrationWarning(owned()),
        SayType::BrowserActionLaunch => MessageBody::SayBrowserActionLaunch(owned()),
        SayType::BrowserAction => MessageBody::SayBrowserAction(embedded(text)?),
        SayType::BrowserActionResult => MessageBody::SayBrowserActionResult(embedded(text)?),
        SayType::McpServerRequestStarted => MessageBody::SayMcpServerRequestStarted(owned()),
        SayType::McpServerResponse => MessageBody::SayMcpServerResponse(mcp_response(text)),
        SayType::UseMcpServer => MessageBody::SayUseMcpServer(embedded(text)?),
        SayType::DiffError => diff_error(text),
        SayType::DeletedApiReqs => {
            #[derive(Default, Deserialize)]
            #[serde(default)]
            struct Deleted {
                count: Option<u64>,
            }
            let parsed: Deleted = embedded(text)?;
            MessageBody::SayDeletedApiReqs {
                count: parsed.count.unwrap_or(0),
            }
        }
        SayType::ClineignoreError => MessageBody::SayIgnoreError(owned()),
        SayType::CheckpointCreated => MessageBody::SayCheckpointCreated(owned()),
        SayType::LoadMcpDocumentation => MessageBody::SayLoadMcpDocumentation,
    })
}

/// `{serverName, response}` yields the serialized `response`; anything else is kept as is.
fn mcp_response(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => text.to_owned(),
        },
        _ => text.to_owned(),
    }
}

/// `{error, path}` when JSON, otherwise the plain text is the error.
fn diff_error(text: &str) -> MessageBody {
    #[derive(Deserialize)]
    struct DiffErr {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        path: Option<String>,
    }
    match serde_json::from_str::<DiffErr>(text) {
        Ok(parsed) => MessageBody::SayDiffError {
            error: parsed.error.unwrap_or_default(),
            path: parsed.path.unwrap_or_default(),
        },
        Err(_) => MessageBody::SayDiffError {
            error: text.to_owned(),
            path: String::new(),
        },
    }
}
