//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// 8 MiB
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 8 * 1024 * 1024;

/// Built-in default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Largest input file accepted
    pub max_input_bytes: u64,

    /// Permission bits of the committed file
    pub file_mode: u32,

    /// Log the sniffed format hint
    pub sniff: bool,

    /// Default log level (default: "info")
    pub log_level: String,

    /// Log output format (default: "pretty")
    pub log_format: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            file_mode: 0o644,
            sniff: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to the layered settings shape
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "max_input_bytes": self.max_input_bytes,
            "file_mode": self.file_mode,
            "sniff": self.sniff,
            "log": {
                "level": self.log_level,
                "format": self.log_format
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.max_input_bytes, 8 * 1024 * 1024);
        assert_eq!(defaults.file_mode, 0o644);
        assert!(defaults.sniff);
        assert_eq!(defaults.log_level, "info");
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();
        assert_eq!(value["file_mode"], 420);
        assert_eq!(value["log"]["format"], "pretty");
    }
}
