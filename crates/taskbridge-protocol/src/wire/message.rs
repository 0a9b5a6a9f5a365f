//! Wire representation of a single message.
//!
//! A [`WireMessage`] carries two parallel enums ([`AskKind`], [`SayKind`])
//! and at most one typed [`MessagePayload`]. When no payload case applies,
//! the raw engine text travels in the generic `text` field instead.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Top-level discriminator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessageType {
    /// Not set.
    #[default]
    #[serde(rename = "MESSAGE_TYPE_UNSPECIFIED")]
    Unspecified,
    /// The engine waits on the user.
    #[serde(rename = "ASK")]
    Ask,
    /// The engine reports.
    #[serde(rename = "SAY")]
    Say,
}

/// Wire ask subtype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AskKind {
    /// Unknown or not an ask.
    #[default]
    #[serde(rename = "ASK_TYPE_UNSPECIFIED")]
    Unspecified,
    Followup,
    PlanModeRespond,
    Command,
    CommandOutput,
    CompletionResult,
    Tool,
    ApiReqFailed,
    ResumeTask,
    ResumeCompletedTask,
    MistakeLimitReached,
    AutoApprovalMaxReqReached,
    BrowserActionLaunch,
    UseMcpServer,
    #[serde(rename = "ASK_NEW_TASK")]
    NewTask,
}

/// Wire say subtype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SayKind {
    /// Unknown or not a say.
    #[default]
    #[serde(rename = "SAY_TYPE_UNSPECIFIED")]
    Unspecified,
    SayTask,
    SayError,
    ApiReqStarted,
    ApiReqFinished,
    ApiReqRetried,
    SayText,
    Reasoning,
    SayCompletionResult,
    UserFeedback,
    UserFeedbackDiff,
    SayCommand,
    SayCommandOutput,
    SayTool,
    ShellIntegrationWarning,
    SayBrowserActionLaunch,
    BrowserAction,
    BrowserActionResult,
    McpServerRequestStarted,
    McpServerResponse,
    SayUseMcpServer,
    DiffError,
    DeletedApiReqs,
    IgnoreError,
    CheckpointCreated,
    LoadMcpDocumentation,
}

/// Tool category inside tool payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolType {
    /// Unmapped tool.
    #[default]
    #[serde(rename = "TOOL_TYPE_UNSPECIFIED")]
    Unspecified,
    EditedExistingFile,
    NewFileCreated,
    ReadFile,
    ListFilesTopLevel,
    ListFilesRecursive,
    ListCodeDefinitionNames,
    SearchFiles,
    ExecuteCommand,
    BrowserAction,
}

/// Browser action verb.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrowserActionType {
    /// Unknown verb.
    #[default]
    #[serde(rename = "BROWSER_ACTION_UNSPECIFIED")]
    Unspecified,
    Launch,
    Click,
    Type,
    ScrollDown,
    ScrollUp,
    Close,
}

/// MCP request flavor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum McpRequestType {
    /// Unknown flavor.
    #[default]
    #[serde(rename = "MCP_REQUEST_TYPE_UNSPECIFIED")]
    Unspecified,
    UseMcpTool,
    AccessMcpResource,
}

/// Why an API request was cancelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// Not cancelled, or unknown reason.
    #[default]
    #[serde(rename = "CANCEL_REASON_UNSPECIFIED")]
    Unspecified,
    StreamingFailed,
    UserCancelled,
}

// ── Payload structs ─────────────────────────────────────────────────

/// `askQuestion`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question: String,
    pub options: Vec<String>,
}

/// `askPlanModeResponse`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanModeResponsePayload {
    pub response: String,
    pub options: Vec<String>,
}

/// Tool details shared by `askTool` and `sayTool`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPayload {
    pub tool_type: ToolType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    pub operation_is_located_in_workspace: bool,
}

/// MCP server use, for `askUseMcpServer` and inside `sayUseMcpServer`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerPayload {
    pub server_name: String,
    #[serde(rename = "type")]
    pub request_type: McpRequestType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// `sayApiReqInfo`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReqInfoPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_writes: u64,
    pub cache_reads: u64,
    pub cost: f64,
    pub cancel_reason: CancelReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_failed_message: Option<String>,
}

/// `sayBrowserAction`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserActionPayload {
    pub action: BrowserActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// `sayBrowserActionResult`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserActionResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_mouse_position: Option<String>,
}

/// The oneof payload. Serialized as a single camelCase key on the message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MessagePayload {
    AskQuestion(QuestionPayload),
    AskPlanModeResponse(PlanModeResponsePayload),
    AskCommand { command_text: String },
    AskCommandOutput { output_text: String },
    AskCompletionResult { result_text: String },
    AskTool(ToolPayload),
    AskApiReqFailed { error_message: String },
    AskResumeTask { task_id: String },
    AskResumeCompletedTask { task_id: String },
    AskMistakeLimitReached {},
    AskAutoApprovalMaxReqReached {},
    AskBrowserActionLaunch { url: String },
    AskUseMcpServer(McpServerPayload),
    AskNewTask { context: String },
    SayTask { task_description: String },
    SayError { error_message: String },
    SayApiReqInfo(ApiReqInfoPayload),
    SayText { text_content: String },
    SayReasoning { reasoning_text: String },
    SayCompletionResult { result_text: String, has_changes: bool },
    SayUserFeedback { feedback_text: String },
    SayUserFeedbackDiff { diff_content: String },
    SayCommand { command_text: String },
    SayCommandOutput { output_text: String },
    SayTool(ToolPayload),
    SayShellIntegrationWarning { warning_message: String },
    SayBrowserActionLaunch { url: String },
    SayBrowserAction(BrowserActionPayload),
    SayBrowserActionResult(BrowserActionResultPayload),
    SayMcpServerRequestStarted { server_name: String },
    SayMcpServerResponse { response_content: String },
    SayUseMcpServer { details: McpServerPayload },
    SayDiffError { error_message: String, path: String },
    SayDeletedApiReqs { count: u64 },
    SayIgnoreError { error_message: String },
    SayCheckpointCreated { checkpoint_hash: String },
    SayLoadMcpDocumentation {},
}

/// One message as clients see it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Logical timestamp; stable identity of the message.
    pub ts: i64,
    /// Top-level discriminator.
    #[serde(rename = "type")]
    pub message_type: WireMessageType,
    /// Ask subtype, `ASK_TYPE_UNSPECIFIED` for says.
    pub ask_type: AskKind,
    /// Say subtype, `SAY_TYPE_UNSPECIFIED` for asks.
    pub say_type: SayKind,
    /// Generic fallback text. Empty whenever `payload` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reasoning text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Attached images.
    pub images: Vec<String>,
    /// Always `false` for reconciled messages.
    pub partial: bool,
    /// Checkpoint hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_hash: Option<String>,
    /// Whether the checkpoint is checked out.
    pub is_checkpoint_checked_out: bool,
    /// Whether the operation leaves the workspace.
    pub is_operation_outside_workspace: bool,
    /// Index into conversation history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_history_index: Option<i64>,
    /// Typed payload.
    #[serde(flatten)]
    pub payload: Option<MessagePayload>,
}
