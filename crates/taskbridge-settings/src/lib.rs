//! # taskbridge-settings
//!
//! Configuration for the taskbridge server, loaded from three layers in
//! priority order:
//! 1. **Compiled defaults**: [`TaskbridgeSettings::default()`]
//! 2. **Settings file**: `~/.taskbridge/settings.json` or an explicit path
//! 3. **Environment**: `TASKBRIDGE_<SECTION>__<FIELD>` overrides
//!
//! Loaded settings are validated; out-of-range values fail with
//! [`SettingsError::InvalidValue`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::*;
