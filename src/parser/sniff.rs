//! Cheap content sniffing.
//!
//! The hint is logged and recorded in the chain outcome. It never changes
//! which parsers run or in what order.

use std::fmt;

use ingest_convert::sharelink::looks_like_link;
use serde::{Deserialize, Serialize};

use super::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatHint {
    Empty,
    JsonObject,
    JsonArray,
    Link,
    Base64,
    Yaml,
    Unknown,
}

impl FormatHint {
    /// The format this hint suggests, if any.
    pub fn likely_format(&self) -> Option<Format> {
        match self {
            FormatHint::JsonObject => Some(Format::Canonical),
            FormatHint::JsonArray | FormatHint::Link | FormatHint::Base64 => Some(Format::ShareLink),
            FormatHint::Yaml => Some(Format::RuleYaml),
            FormatHint::Empty | FormatHint::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::Empty => "empty",
            FormatHint::JsonObject => "json-object",
            FormatHint::JsonArray => "json-array",
            FormatHint::Link => "link",
            FormatHint::Base64 => "base64",
            FormatHint::Yaml => "yaml",
            FormatHint::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Classify input by its first non-whitespace byte and first line.
pub fn sniff(bytes: &[u8]) -> FormatHint {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let Some(start) = bytes.iter().position(|b| !b.is_ascii_whitespace()) else {
        return FormatHint::Empty;
    };

    match bytes[start] {
        b'{' => return FormatHint::JsonObject,
        b'[' => return FormatHint::JsonArray,
        _ => {}
    }

    let rest = &bytes[start..];
    let line_end = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
    let Ok(line) = std::str::from_utf8(&rest[..line_end]) else {
        return FormatHint::Unknown;
    };
    let line = line.trim();

    if looks_like_link(line) {
        FormatHint::Link
    } else if is_base64_line(line) {
        FormatHint::Base64
    } else if line.starts_with("---") || line.starts_with('#') || line.contains(':') {
        FormatHint::Yaml
    } else {
        FormatHint::Unknown
    }
}

fn is_base64_line(line: &str) -> bool {
    line.len() >= 8
        && line
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_' | b'='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(b""), FormatHint::Empty);
        assert_eq!(sniff(b" \n\t"), FormatHint::Empty);
        assert_eq!(sniff(b"\n  {\"log\": {}}"), FormatHint::JsonObject);
        assert_eq!(sniff(b"\xEF\xBB\xBF{}"), FormatHint::JsonObject);
        assert_eq!(sniff(b"[{\"add\": \"x\"}]"), FormatHint::JsonArray);
        assert_eq!(sniff(b"ss://YWVz@1.2.3.4:1#a\nvless://x"), FormatHint::Link);
        assert_eq!(sniff(b"dHJvamFuOi8vcHdAaG9zdDo0NDM="), FormatHint::Base64);
        assert_eq!(sniff(b"port: 7890\nproxies: []"), FormatHint::Yaml);
        assert_eq!(sniff(b"# profile\nproxies: []"), FormatHint::Yaml);
        assert_eq!(sniff(b"hello world"), FormatHint::Unknown);
        assert_eq!(sniff(&[0xff, 0xfe, 0x00]), FormatHint::Unknown);
    }

    #[test]
    fn test_likely_format() {
        assert_eq!(FormatHint::JsonObject.likely_format(), Some(Format::Canonical));
        assert_eq!(FormatHint::Base64.likely_format(), Some(Format::ShareLink));
        assert_eq!(FormatHint::Yaml.likely_format(), Some(Format::RuleYaml));
        assert_eq!(FormatHint::Unknown.likely_format(), None);
    }
}
