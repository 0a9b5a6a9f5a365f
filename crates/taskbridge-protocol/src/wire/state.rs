//! Wire representation of the engine state snapshot.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use super::message::WireMessage;

/// Provider enum as it appears on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiProvider {
    #[default]
    #[serde(rename = "API_PROVIDER_UNSPECIFIED")]
    Unspecified,
    Anthropic,
    Openrouter,
    Bedrock,
    Vertex,
    Openai,
    Ollama,
    Lmstudio,
    Gemini,
    OpenaiNative,
    Requesty,
    Together,
    Deepseek,
    Qwen,
    Doubao,
    Mistral,
    VscodeLm,
    Cline,
    Litellm,
    Asksage,
    Xai,
    Sambanova,
}

/// Chat mode on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireChatMode {
    #[default]
    #[serde(rename = "CHAT_MODE_UNSPECIFIED")]
    Unspecified,
    Plan,
    Act,
}

/// Host platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Aix,
    Darwin,
    Freebsd,
    Linux,
    Openbsd,
    Sunos,
    Win32,
    #[default]
    Unknown,
}

/// Telemetry opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetrySetting {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

/// Whether a task is loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    #[default]
    Idle,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHistoryItem {
    pub id: String,
    pub ts: i64,
    pub task: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_writes: u64,
    pub cache_reads: u64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireApiConfiguration {
    pub api_provider: ApiProvider,
    pub api_model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_ai_base_url: Option<String>,
    pub favorited_model_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChatSettings {
    pub mode: WireChatMode,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct WireAutoApprovalActions {
    pub read_files: bool,
    pub edit_files: bool,
    pub execute_commands: bool,
    pub use_browser: bool,
    pub use_mcp: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAutoApprovalSettings {
    pub enabled: bool,
    pub max_requests: u32,
    pub enable_notifications: bool,
    pub actions: WireAutoApprovalActions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireViewport {
    pub width: u32,
    pub height: u32,
}

impl Default for WireViewport {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBrowserSettings {
    pub viewport: WireViewport,
    pub headless: bool,
}

/// Full state as clients see it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireState {
    pub version: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<WireHistoryItem>,
    pub current_task_status: TaskStatus,
    pub task_history: Vec<WireHistoryItem>,
    pub api_configuration: WireApiConfiguration,
    pub chat_settings: WireChatSettings,
    pub auto_approval_settings: WireAutoApprovalSettings,
    pub browser_settings: WireBrowserSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    pub platform: Platform,
    pub telemetry_setting: TelemetrySetting,
}
