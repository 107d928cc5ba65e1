//! Format parsers
//!
//! Each parser turns raw input bytes into a canonical candidate or fails.
//! Parsers do not distinguish "not my format" from "my format but
//! malformed"; the chain moves on after any failure.

mod canonical;
mod rule_yaml;
mod share_link;
pub mod sniff;

use std::fmt;
use std::str::Utf8Error;

use ingest_convert::{RulesError, ShareLinkError};
use ingest_schema::SchemaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::MergeError;

pub use canonical::CanonicalParser;
pub use rule_yaml::RuleYamlParser;
pub use share_link::ShareLinkParser;
pub use sniff::{sniff, FormatHint};

/// Input formats, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Canonical,
    ShareLink,
    RuleYaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Canonical => "canonical",
            Format::ShareLink => "share-link",
            Format::RuleYaml => "rule-yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input for one pipeline invocation. Read once, never modified.
#[derive(Debug, Clone)]
pub struct RawDocument {
    bytes: Vec<u8>,
    debug: bool,
}

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, debug: bool) -> Self {
        Self {
            bytes: bytes.into(),
            debug,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether per-parser diagnostics should be surfaced.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The input as UTF-8 text.
    pub fn text(&self) -> Result<&str, ParseError> {
        Ok(std::str::from_utf8(&self.bytes)?)
    }
}

/// Why a single parser rejected the input.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    ShareLink(#[from] ShareLinkError),

    #[error("{0}")]
    Rules(#[from] RulesError),

    #[error("template merge: {0}")]
    Merge(#[from] MergeError),

    #[error("{0}")]
    Other(String),
}

/// A parser in the fallback chain.
pub trait FormatParser: Send + Sync {
    /// The format this parser accepts.
    fn format(&self) -> Format;

    /// Produce canonical candidate bytes from `raw`.
    fn parse(&self, raw: &RawDocument) -> Result<Vec<u8>, ParseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(Format::Canonical.to_string(), "canonical");
        assert_eq!(Format::ShareLink.to_string(), "share-link");
        assert_eq!(
            serde_json::to_string(&Format::RuleYaml).unwrap(),
            "\"rule-yaml\""
        );
    }

    #[test]
    fn test_raw_document_text() {
        let raw = RawDocument::new(b"hello".to_vec(), false);
        assert_eq!(raw.text().unwrap(), "hello");
        assert_eq!(raw.len(), 5);
        assert!(!raw.debug());

        let raw = RawDocument::new(vec![0xff, 0xfe], true);
        assert!(matches!(raw.text(), Err(ParseError::Utf8(_))));
    }
}
