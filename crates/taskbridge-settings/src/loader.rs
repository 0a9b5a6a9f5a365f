//! Layered settings loading.
//!
//! Loading flow:
//! 1. Compiled [`TaskbridgeSettings::default()`]
//! 2. `~/.taskbridge/settings.json` (or an explicit path), merged per key
//! 3. `TASKBRIDGE_<SECTION>__<FIELD>` environment overrides
//!
//! Layers 1 and 2 are merged with `figment`; environment values go through
//! strict range-checked parsers and invalid ones are ignored with a warning.
//! The result is validated before it is returned.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use taskbridge_core::logging::LogFormat;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::TaskbridgeSettings;

/// Path to the default settings file (`~/.taskbridge/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".taskbridge").join("settings.json")
}

/// Load settings from the default path.
pub fn load_settings() -> Result<TaskbridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, falling back to defaults when it is missing.
pub fn load_settings_from_path(path: &Path) -> Result<TaskbridgeSettings> {
    let mut figment = Figment::from(Serialized::defaults(TaskbridgeSettings::default()));

    if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        figment = figment.merge(Json::string(&content));
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: TaskbridgeSettings = figment.extract()?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Apply `TASKBRIDGE_*` environment overrides.
pub fn apply_env_overrides(settings: &mut TaskbridgeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
fn apply_overrides(settings: &mut TaskbridgeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ───────────────────────────────────────────────────────
    if let Some(v) = read("TASKBRIDGE_SERVER__HOST") {
        settings.server.host = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_SERVER__PORT", |v| parse_u16_range(v, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_SERVER__MAX_CONNECTIONS", |v| {
        parse_usize_range(v, 1, 100_000)
    }) {
        settings.server.max_connections = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_SERVER__MAX_MESSAGE_SIZE", |v| {
        parse_usize_range(v, 1024, 1_073_741_824)
    }) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = read("TASKBRIDGE_SERVER__API_KEY") {
        settings.server.api_key = Some(v);
    }

    // ── Bridge ───────────────────────────────────────────────────────
    if let Some(v) = checked(&read, "TASKBRIDGE_BRIDGE__RESYNC_INTERVAL_SECS", |v| {
        parse_u64_range(v, 0, 86_400)
    }) {
        settings.bridge.resync_interval_secs = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_BRIDGE__COMMAND_TIMEOUT_SECS", |v| {
        parse_u64_range(v, 1, 3600)
    }) {
        settings.bridge.command_timeout_secs = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_BRIDGE__FOCUS_TIMEOUT_MS", |v| {
        parse_u64_range(v, 0, 60_000)
    }) {
        settings.bridge.focus_timeout_ms = v;
    }

    // ── Logging ──────────────────────────────────────────────────────
    if let Some(v) = read("TASKBRIDGE_LOGGING__LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = checked(&read, "TASKBRIDGE_LOGGING__FORMAT", parse_log_format) {
        settings.logging.format = v;
    }
}

fn checked<T>(
    read: impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = read(name)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key = name, value = %raw, "invalid env override, ignoring");
    }
    parsed
}

// ── Pure parsers ────────────────────────────────────────────────────

/// Parse a `u16` within `min..=max`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `usize` within `min..=max`.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse `compact` or `json` (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.trim().to_ascii_lowercase().as_str() {
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}
