//! Effective settings with provenance
//!
//! The merged layers are decoded into typed [`Settings`] and validated. The
//! list of contributing sources (with a digest of each file) is kept so the
//! `--json` report can say where the values came from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::commit::compute_sha256;

/// 64 MiB
pub const MAX_INPUT_BYTES_LIMIT: u64 = 64 * 1024 * 1024;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Origin of a settings layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    pub origin: SettingsOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

/// Typed, validated tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub max_input_bytes: u64,
    pub file_mode: u32,
    pub sniff: bool,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            max_input_bytes: defaults.max_input_bytes,
            file_mode: defaults.file_mode,
            sniff: defaults.sniff,
            log: LogSettings {
                level: defaults.log_level,
                format: LogFormat::Pretty,
            },
        }
    }
}

/// Merged settings plus where they came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub created_at: DateTime<Utc>,
    pub settings: Settings,
    /// Contributing sources in precedence order
    pub sources: Vec<SettingsSource>,
}

impl EffectiveSettings {
    /// Build settings from defaults, an optional TOML file and CLI overrides.
    ///
    /// A settings path that does not exist is skipped.
    pub fn build(settings_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, SettingsError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = settings_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                layers.push(value);
                sources.push(SettingsSource {
                    origin: SettingsOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            } else {
                tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings: Settings =
            serde_json::from_value(merged).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate(&settings)?;

        Ok(Self {
            created_at: Utc::now(),
            settings,
            sources,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `$XDG_CONFIG_HOME/proxy-ingest/config.toml`, falling back to
/// `~/.config/proxy-ingest/config.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("proxy-ingest").join("config.toml"))
}

fn load_toml_file(path: &Path) -> Result<(Value, String), SettingsError> {
    let bytes = fs::read(path).map_err(|e| SettingsError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let digest = compute_sha256(&bytes);

    let contents = String::from_utf8(bytes)
        .map_err(|e| SettingsError::Parse(format!("invalid UTF-8: {}", e)))?;
    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| SettingsError::Parse(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml_value), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn validate(settings: &Settings) -> Result<(), SettingsError> {
    if settings.max_input_bytes == 0 || settings.max_input_bytes > MAX_INPUT_BYTES_LIMIT {
        return Err(SettingsError::Invalid(format!(
            "max_input_bytes must be in (0, {}]",
            MAX_INPUT_BYTES_LIMIT
        )));
    }

    if settings.file_mode > 0o777 {
        return Err(SettingsError::Invalid(format!(
            "file_mode {:o} has bits outside 0o777",
            settings.file_mode
        )));
    }

    if !LOG_LEVELS.contains(&settings.log.level.as_str()) {
        return Err(SettingsError::Invalid(format!(
            "log.level must be one of {}",
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let effective = EffectiveSettings::build(None, None).unwrap();
        assert_eq!(effective.settings, Settings::default());
        assert_eq!(effective.sources.len(), 1);
        assert_eq!(effective.sources[0].origin, SettingsOrigin::Builtin);
    }

    #[test]
    fn test_file_layer_with_octal_mode() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "file_mode = 0o600").unwrap();
        writeln!(temp, "[log]").unwrap();
        writeln!(temp, "format = \"json\"").unwrap();

        let effective = EffectiveSettings::build(Some(temp.path()), None).unwrap();
        assert_eq!(effective.settings.file_mode, 0o600);
        assert_eq!(effective.settings.log.format, LogFormat::Json);
        assert_eq!(effective.settings.log.level, "info");
        assert_eq!(effective.sources[1].origin, SettingsOrigin::File);
        assert_eq!(effective.sources[1].digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_cli_wins_over_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "[log]\nlevel = \"warn\"").unwrap();

        let cli = serde_json::json!({"log": {"level": "debug"}});
        let effective = EffectiveSettings::build(Some(temp.path()), Some(cli)).unwrap();
        assert_eq!(effective.settings.log.level, "debug");
        assert_eq!(effective.sources.len(), 3);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let effective =
            EffectiveSettings::build(Some(Path::new("/nonexistent/proxy-ingest.toml")), None)
                .unwrap();
        assert_eq!(effective.sources.len(), 1);
    }

    #[test]
    fn test_validation() {
        for overrides in [
            serde_json::json!({"max_input_bytes": 0}),
            serde_json::json!({"max_input_bytes": MAX_INPUT_BYTES_LIMIT + 1}),
            serde_json::json!({"file_mode": 0o1777}),
            serde_json::json!({"log": {"level": "loud"}}),
        ] {
            let err = EffectiveSettings::build(None, Some(overrides)).unwrap_err();
            assert!(matches!(err, SettingsError::Invalid(_)), "{}", err);
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "timeout = 5").unwrap();
        let err = EffectiveSettings::build(Some(temp.path()), None).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));

        let err =
            EffectiveSettings::build(None, Some(serde_json::json!({"log": {"format": "xml"}})))
                .unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_bad_toml() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "file_mode = ").unwrap();
        let err = EffectiveSettings::build(Some(temp.path()), None).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }
}
