//! Provider enum mapping and inbound settings translation.

use taskbridge_core::state::{ApiConfigUpdate, ChatMode, SettingsUpdate};

use crate::errors::DecodeError;
use crate::wire::control::UpdateSettingsRequest;
use crate::wire::state::{ApiProvider, WireChatMode};

const PROVIDERS: &[(ApiProvider, &str)] = &[
    (ApiProvider::Anthropic, "anthropic"),
    (ApiProvider::Openrouter, "openrouter"),
    (ApiProvider::Bedrock, "bedrock"),
    (ApiProvider::Vertex, "vertex"),
    (ApiProvider::Openai, "openai"),
    (ApiProvider::Ollama, "ollama"),
    (ApiProvider::Lmstudio, "lmstudio"),
    (ApiProvider::Gemini, "gemini"),
    (ApiProvider::OpenaiNative, "openai-native"),
    (ApiProvider::Requesty, "requesty"),
    (ApiProvider::Together, "together"),
    (ApiProvider::Deepseek, "deepseek"),
    (ApiProvider::Qwen, "qwen"),
    (ApiProvider::Doubao, "doubao"),
    (ApiProvider::Mistral, "mistral"),
    (ApiProvider::VscodeLm, "vscode-lm"),
    (ApiProvider::Cline, "cline"),
    (ApiProvider::Litellm, "litellm"),
    (ApiProvider::Asksage, "asksage"),
    (ApiProvider::Xai, "xai"),
    (ApiProvider::Sambanova, "sambanova"),
];

/// Engine provider tag to wire enum; unknown tags are unspecified.
pub fn provider_to_wire(tag: &str) -> ApiProvider {
    PROVIDERS
        .iter()
        .find(|(_, t)| *t == tag)
        .map_or(ApiProvider::Unspecified, |(p, _)| *p)
}

/// Wire enum to engine provider tag; `None` for unspecified.
pub fn provider_from_wire(provider: ApiProvider) -> Option<&'static str> {
    PROVIDERS.iter().find(|(p, _)| *p == provider).map(|(_, t)| *t)
}

/// Wire chat mode to engine chat mode; unspecified means no change.
pub fn chat_mode_from_wire(mode: WireChatMode) -> Option<ChatMode> {
    match mode {
        WireChatMode::Plan => Some(ChatMode::Plan),
        WireChatMode::Act => Some(ChatMode::Act),
        WireChatMode::Unspecified => None,
    }
}

/// Translate an `updateSettings` request. An update that changes nothing is rejected.
pub fn settings_from_wire(req: &UpdateSettingsRequest) -> Result<SettingsUpdate, DecodeError> {
    let api_configuration = req.api_configuration.as_ref().map(|api| ApiConfigUpdate {
        api_provider: api
            .api_provider
            .and_then(provider_from_wire)
            .map(str::to_owned),
        api_key: api.api_key.clone(),
        api_model_id: api.api_model_id.clone(),
        open_ai_base_url: api.open_ai_base_url.clone(),
        favorited_model_ids: api.favorited_model_ids.clone(),
    });
    let update = SettingsUpdate {
        api_configuration: api_configuration.filter(|api| !api.is_empty()),
        chat_mode: req.chat_mode.and_then(chat_mode_from_wire),
    };
    if update.is_empty() {
        return Err(DecodeError::invalid("updateSettings changes nothing"));
    }
    Ok(update)
}
