//! Tool settings
//!
//! Settings are merged from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Settings file (`$XDG_CONFIG_HOME/proxy-ingest/config.toml`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    default_settings_path, EffectiveSettings, LogFormat, LogSettings, Settings, SettingsError,
    SettingsOrigin, SettingsSource, MAX_INPUT_BYTES_LIMIT,
};
pub use merge::{deep_merge, merge_layers};
