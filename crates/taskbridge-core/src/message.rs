//! The task engine's internal message model.
//!
//! [`EngineMessage`] is what the engine emits: a top-level `ask`/`say`
//! discriminator, a string subtype, free text (often JSON-in-string) and
//! metadata. The subtype strings are recognised through [`AskType`] and
//! [`SayType`]; anything else is kept verbatim so it can still be carried
//! through a fallback representation.

use serde::{Deserialize, Serialize};

/// Declares a closed string-tagged enum with `as_str`/`parse`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])* $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The engine's string tag for this variant.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse an engine string tag. Unknown tags return `None`.
            pub fn parse(tag: &str) -> Option<Self> {
                match tag {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Subtypes of `ask` messages (the engine is waiting on the user).
    AskType {
        /// Free-form follow-up question, JSON `{question, options}`.
        Followup => "followup",
        /// Plan-mode response, JSON `{response, options}`.
        PlanModeRespond => "plan_mode_respond",
        /// Approval to run a command.
        Command => "command",
        /// Approval to keep streaming command output.
        CommandOutput => "command_output",
        /// Task completion awaiting acknowledgement.
        CompletionResult => "completion_result",
        /// Tool use approval, JSON tool descriptor.
        Tool => "tool",
        /// API request failed, retry?
        ApiReqFailed => "api_req_failed",
        /// Resume an interrupted task.
        ResumeTask => "resume_task",
        /// Resume a completed task.
        ResumeCompletedTask => "resume_completed_task",
        /// Too many consecutive mistakes.
        MistakeLimitReached => "mistake_limit_reached",
        /// Auto-approval request budget exhausted.
        AutoApprovalMaxReqReached => "auto_approval_max_req_reached",
        /// Approval to launch a browser at a URL.
        BrowserActionLaunch => "browser_action_launch",
        /// Approval to use an MCP server, JSON descriptor.
        UseMcpServer => "use_mcp_server",
        /// Proposal to start a new task, JSON `{context}`.
        NewTask => "new_task",
        /// Proposal to condense the conversation.
        Condense => "condense",
    }
}

string_enum! {
    /// Subtypes of `say` messages (the engine is reporting).
    SayType {
        /// The initial task text.
        Task => "task",
        /// An error report.
        Error => "error",
        /// API request started, JSON request info.
        ApiReqStarted => "api_req_started",
        /// API request finished, JSON request info.
        ApiReqFinished => "api_req_finished",
        /// API request retried, JSON request info.
        ApiReqRetried => "api_req_retried",
        /// Plain assistant text.
        Text => "text",
        /// Model reasoning.
        Reasoning => "reasoning",
        /// Completion summary.
        CompletionResult => "completion_result",
        /// User feedback echoed into the conversation.
        UserFeedback => "user_feedback",
        /// User feedback as a diff.
        UserFeedbackDiff => "user_feedback_diff",
        /// A command being run.
        Command => "command",
        /// Output of a command.
        CommandOutput => "command_output",
        /// Tool use report, JSON tool descriptor.
        Tool => "tool",
        /// Shell integration unavailable.
        ShellIntegrationWarning => "shell_integration_warning",
        /// Browser launched at a URL.
        BrowserActionLaunch => "browser_action_launch",
        /// Browser action, JSON `{action, coordinate, text}`.
        BrowserAction => "browser_action",
        /// Browser action result, JSON.
        BrowserActionResult => "browser_action_result",
        /// MCP request started.
        McpServerRequestStarted => "mcp_server_request_started",
        /// MCP server response.
        McpServerResponse => "mcp_server_response",
        /// MCP server in use.
        UseMcpServer => "use_mcp_server",
        /// Diff application failed.
        DiffError => "diff_error",
        /// API requests were deleted from history, JSON `{count}`.
        DeletedApiReqs => "deleted_api_reqs",
        /// A path was blocked by the ignore file.
        ClineignoreError => "clineignore_error",
        /// A checkpoint was created.
        CheckpointCreated => "checkpoint_created",
        /// MCP documentation was loaded.
        LoadMcpDocumentation => "load_mcp_documentation",
    }
}

/// Top-level message discriminator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// The engine asks the user for something.
    Ask,
    /// The engine reports something.
    #[default]
    Say,
}

/// One message as the task engine emits it.
///
/// `ts` is the stable identity of a logical message; partial updates for the
/// same logical message share it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMessage {
    /// Logical timestamp (milliseconds). Absent timestamps cannot be reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// `ask` or `say`.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Ask subtype tag, when `message_type` is `Ask`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<String>,
    /// Say subtype tag, when `message_type` is `Say`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub say: Option<String>,
    /// Text content; for several subtypes an embedded JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reasoning text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Attached image data URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// `Some(true)` while the message is still streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    /// Checkpoint hash taken at this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_hash: Option<String>,
    /// Whether that checkpoint is currently checked out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checkpoint_checked_out: Option<bool>,
    /// Whether the operation touches files outside the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_operation_outside_workspace: Option<bool>,
    /// Index into the API conversation history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history_index: Option<i64>,
}

impl EngineMessage {
    /// A complete `say` message.
    pub fn say(ts: i64, say: SayType, text: impl Into<String>) -> Self {
        Self {
            ts: Some(ts),
            message_type: MessageType::Say,
            say: Some(say.as_str().to_owned()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A complete `ask` message.
    pub fn ask(ts: i64, ask: AskType, text: impl Into<String>) -> Self {
        Self {
            ts: Some(ts),
            message_type: MessageType::Ask,
            ask: Some(ask.as_str().to_owned()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Set the partial flag.
    #[must_use]
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = Some(partial);
        self
    }

    /// Whether this event is a not-yet-final chunk. Absent means complete.
    pub fn is_partial(&self) -> bool {
        self.partial == Some(true)
    }

    /// The raw subtype tag for the message's discriminator, or `""`.
    pub fn subtype(&self) -> &str {
        let tag = match self.message_type {
            MessageType::Ask => self.ask.as_deref(),
            MessageType::Say => self.say.as_deref(),
        };
        tag.unwrap_or("")
    }

    /// Recognised ask subtype, if this is an `ask` with a known tag.
    pub fn ask_type(&self) -> Option<AskType> {
        match self.message_type {
            MessageType::Ask => self.ask.as_deref().and_then(AskType::parse),
            MessageType::Say => None,
        }
    }

    /// Recognised say subtype, if this is a `say` with a known tag.
    pub fn say_type(&self) -> Option<SayType> {
        match self.message_type {
            MessageType::Say => self.say.as_deref().and_then(SayType::parse),
            MessageType::Ask => None,
        }
    }

    /// Text content or `""`.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
