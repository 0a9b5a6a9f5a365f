//! Engine state snapshot to [`WireState`].

use taskbridge_core::state::{ChatMode, EngineState, HistoryItem};

use super::message::to_wire;
use super::settings::provider_to_wire;
use crate::wire::state::{
    Platform, TaskStatus, TelemetrySetting, WireApiConfiguration, WireAutoApprovalActions,
    WireAutoApprovalSettings, WireBrowserSettings, WireChatMode, WireChatSettings, WireHistoryItem,
    WireState, WireViewport,
};

/// Translate a full snapshot. Messages without a timestamp are skipped.
pub fn state_to_wire(state: &EngineState) -> WireState {
    let api = &state.api_configuration;
    let approval = &state.auto_approval;
    let actions = &approval.actions;

    WireState {
        version: state.version.clone().unwrap_or_else(|| "unknown".to_owned()),
        messages: state.messages.iter().filter_map(to_wire).collect(),
        current_task: state.current_task.as_ref().map(history_item),
        current_task_status: if state.current_task.is_some() {
            TaskStatus::Running
        } else {
            TaskStatus::Idle
        },
        task_history: state.task_history.iter().map(history_item).collect(),
        api_configuration: WireApiConfiguration {
            api_provider: api.api_provider.as_deref().map(provider_to_wire).unwrap_or_default(),
            api_model_id: api.api_model_id.clone().unwrap_or_default(),
            open_ai_base_url: api.open_ai_base_url.clone(),
            favorited_model_ids: api.favorited_model_ids.clone(),
        },
        chat_settings: WireChatSettings {
            mode: match state.chat_mode {
                Some(ChatMode::Plan) => WireChatMode::Plan,
                Some(ChatMode::Act) => WireChatMode::Act,
                None => WireChatMode::Unspecified,
            },
        },
        auto_approval_settings: WireAutoApprovalSettings {
            enabled: approval.enabled.unwrap_or(false),
            max_requests: approval.max_requests.unwrap_or(0),
            enable_notifications: approval.enable_notifications.unwrap_or(false),
            actions: WireAutoApprovalActions {
                read_files: actions.read_files.unwrap_or(false),
                edit_files: actions.edit_files.unwrap_or(false),
                execute_commands: actions.execute_commands.unwrap_or(false),
                use_browser: actions.use_browser.unwrap_or(false),
                use_mcp: actions.use_mcp.unwrap_or(false),
            },
        },
        browser_settings: WireBrowserSettings {
            viewport: state.browser.viewport.map_or_else(WireViewport::default, |v| WireViewport {
                width: v.width,
                height: v.height,
            }),
            headless: state.browser.headless.unwrap_or(false),
        },
        custom_instructions: state.custom_instructions.clone(),
        platform: state.platform.as_deref().map_or(Platform::Unknown, platform),
        telemetry_setting: match state.telemetry_setting.as_deref() {
            Some("enabled") => TelemetrySetting::Enabled,
            Some("disabled") => TelemetrySetting::Disabled,
            _ => TelemetrySetting::Unset,
        },
    }
}

fn history_item(item: &HistoryItem) -> WireHistoryItem {
    WireHistoryItem {
        id: item.id.to_string(),
        ts: item.ts,
        task: item.task.clone(),
        tokens_in: item.tokens_in.unwrap_or(0),
        tokens_out: item.tokens_out.unwrap_or(0),
        cache_writes: item.cache_writes.unwrap_or(0),
        cache_reads: item.cache_reads.unwrap_or(0),
        total_cost: item.total_cost.unwrap_or(0.0),
        size: item.size,
    }
}

fn platform(tag: &str) -> Platform {
    match tag {
        "aix" => Platform::Aix,
        "darwin" => Platform::Darwin,
        "freebsd" => Platform::Freebsd,
        "linux" => Platform::Linux,
        "openbsd" => Platform::Openbsd,
        "sunos" => Platform::Sunos,
        "win32" => Platform::Win32,
        _ => Platform::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbridge_core::TaskId;
    use taskbridge_core::message::{EngineMessage, SayType};
    use taskbridge_core::state::{ApiConfiguration, Viewport};

    use crate::wire::state::ApiProvider;

    fn make_history(id: &str) -> HistoryItem {
        HistoryItem {
            id: TaskId::from(id),
            ts: 42,
            task: "build a snake game".into(),
            tokens_in: Some(100),
            ..HistoryItem::default()
        }
    }

    #[test]
    fn empty_state_uses_defaults() {
        let wire = state_to_wire(&EngineState::default());
        assert_eq!(wire.version, "unknown");
        assert_eq!(wire.current_task_status, TaskStatus::Idle);
        assert_eq!(wire.browser_settings.viewport, WireViewport { width: 900, height: 600 });
        assert_eq!(wire.platform, Platform::Unknown);
        assert_eq!(wire.telemetry_setting, TelemetrySetting::Unset);
        assert_eq!(wire.api_configuration.api_provider, ApiProvider::Unspecified);
        assert_eq!(wire.api_configuration.api_model_id, "");
        assert_eq!(wire.auto_approval_settings.max_requests, 0);
    }

    #[test]
    fn current_task_marks_running() {
        let state = EngineState {
            current_task: Some(make_history("t1")),
            task_history: vec![make_history("t1"), make_history("t0")],
            ..EngineState::default()
        };
        let wire = state_to_wire(&state);
        assert_eq!(wire.current_task_status, TaskStatus::Running);
        let current = wire.current_task.unwrap();
        assert_eq!(current.id, "t1");
        assert_eq!(current.tokens_in, 100);
        assert_eq!(current.tokens_out, 0);
        assert_eq!(wire.task_history.len(), 2);
    }

    #[test]
    fn messages_without_ts_are_skipped() {
        let mut orphan = EngineMessage::say(1, SayType::Text, "lost");
        orphan.ts = None;
        let state = EngineState {
            messages: vec![EngineMessage::say(1000, SayType::Text, "kept"), orphan],
            ..EngineState::default()
        };
        let wire = state_to_wire(&state);
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].ts, 1000);
    }

    #[test]
    fn settings_sections_translate() {
        let mut state = EngineState {
            version: Some("3.1.0".into()),
            api_configuration: ApiConfiguration {
                api_provider: Some("openai-native".into()),
                api_model_id: Some("gpt-4o".into()),
                api_key: Some("sk-secret".into()),
                ..ApiConfiguration::default()
            },
            chat_mode: Some(ChatMode::Plan),
            platform: Some("darwin".into()),
            telemetry_setting: Some("disabled".into()),
            ..EngineState::default()
        };
        state.browser.viewport = Some(Viewport { width: 1280, height: 800 });
        state.auto_approval.actions.read_files = Some(true);

        let wire = state_to_wire(&state);
        assert_eq!(wire.version, "3.1.0");
        assert_eq!(wire.api_configuration.api_provider, ApiProvider::OpenaiNative);
        assert_eq!(wire.chat_settings.mode, WireChatMode::Plan);
        assert_eq!(wire.platform, Platform::Darwin);
        assert_eq!(wire.telemetry_setting, TelemetrySetting::Disabled);
        assert_eq!(wire.browser_settings.viewport.width, 1280);
        assert!(wire.auto_approval_settings.actions.read_files);
        assert!(!wire.auto_approval_settings.actions.edit_files);

        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
