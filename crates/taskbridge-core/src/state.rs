//! Engine state snapshots and settings updates.

use serde::{Deserialize, Serialize};

use crate::ids::TaskId;
use crate::message::EngineMessage;

/// Full engine state, as returned by `TaskEngine::state_snapshot`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineState {
    /// Engine version string.
    pub version: Option<String>,
    /// Message history of the current task.
    pub messages: Vec<EngineMessage>,
    /// The task currently loaded in the engine, if any.
    pub current_task: Option<HistoryItem>,
    /// Persisted task history, newest first.
    pub task_history: Vec<HistoryItem>,
    /// Provider configuration.
    pub api_configuration: ApiConfiguration,
    /// Current chat mode.
    pub chat_mode: Option<ChatMode>,
    /// Auto-approval configuration.
    pub auto_approval: AutoApprovalSettings,
    /// Browser tool configuration.
    pub browser: BrowserSettings,
    /// User custom instructions.
    pub custom_instructions: Option<String>,
    /// Host platform tag (`darwin`, `linux`, `win32`, ...).
    pub platform: Option<String>,
    /// Telemetry opt-in (`unset`, `enabled`, `disabled`).
    pub telemetry_setting: Option<String>,
}

/// One persisted task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// Task ID.
    pub id: TaskId,
    /// Creation timestamp (ms).
    #[serde(default)]
    pub ts: i64,
    /// Initial task text.
    #[serde(default)]
    pub task: String,
    /// Input tokens used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u64>,
    /// Output tokens used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u64>,
    /// Cache write tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_writes: Option<u64>,
    /// Cache read tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_reads: Option<u64>,
    /// Accumulated cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Size on disk in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Provider configuration as the engine stores it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfiguration {
    /// Provider tag (`anthropic`, `openrouter`, ...).
    pub api_provider: Option<String>,
    /// Model identifier.
    pub api_model_id: Option<String>,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Base URL for OpenAI-compatible providers.
    pub open_ai_base_url: Option<String>,
    /// Favourited model IDs.
    pub favorited_model_ids: Vec<String>,
}

/// Plan/act mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Plan mode.
    Plan,
    /// Act mode.
    Act,
}

/// Auto-approval configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoApprovalSettings {
    /// Master switch.
    pub enabled: Option<bool>,
    /// Requests allowed before asking again.
    pub max_requests: Option<u32>,
    /// Notify on approvals.
    pub enable_notifications: Option<bool>,
    /// Per-action switches.
    pub actions: AutoApprovalActions,
}

/// Per-action auto-approval switches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AutoApprovalActions {
    /// Read files.
    pub read_files: Option<bool>,
    /// Edit files.
    pub edit_files: Option<bool>,
    /// Execute commands.
    pub execute_commands: Option<bool>,
    /// Use the browser.
    pub use_browser: Option<bool>,
    /// Use MCP servers.
    pub use_mcp: Option<bool>,
}

/// Browser tool configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// Viewport size.
    pub viewport: Option<Viewport>,
    /// Run headless.
    pub headless: Option<bool>,
}

/// Browser viewport size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Partial provider configuration update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfigUpdate {
    /// New provider tag.
    pub api_provider: Option<String>,
    /// New API key.
    pub api_key: Option<String>,
    /// New model identifier.
    pub api_model_id: Option<String>,
    /// New OpenAI-compatible base URL.
    pub open_ai_base_url: Option<String>,
    /// Replacement favourites list.
    pub favorited_model_ids: Option<Vec<String>>,
}

impl ApiConfigUpdate {
    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self.api_provider.is_none()
            && self.api_key.is_none()
            && self.api_model_id.is_none()
            && self.open_ai_base_url.is_none()
            && self.favorited_model_ids.is_none()
    }
}

/// Settings change requested by a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    /// Provider configuration changes.
    pub api_configuration: Option<ApiConfigUpdate>,
    /// Chat mode change.
    pub chat_mode: Option<ChatMode>,
}

impl SettingsUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.api_configuration
            .as_ref()
            .is_none_or(ApiConfigUpdate::is_empty)
            && self.chat_mode.is_none()
    }
}

/// A user's answer to an `ask`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AskResponse {
    /// Free-text reply.
    MessageResponse,
    /// Approve.
    YesButtonClicked,
    /// Reject.
    NoButtonClicked,
}

impl AskResponse {
    /// The engine's string tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageResponse => "messageResponse",
            Self::YesButtonClicked => "yesButtonClicked",
            Self::NoButtonClicked => "noButtonClicked",
        }
    }

    /// Parse the engine's string tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "messageResponse" => Some(Self::MessageResponse),
            "yesButtonClicked" => Some(Self::YesButtonClicked),
            "noButtonClicked" => Some(Self::NoButtonClicked),
            _ => None,
        }
    }
}
