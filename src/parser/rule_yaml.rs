//! Rule-routing YAML, merged into the embedded template.

use ingest_convert::rules;

use super::{Format, FormatParser, ParseError, RawDocument};
use crate::template::{MergeOverrides, Template, TemplateMerger};

/// Deserializes a rule-routing document, converts it to a fragment and
/// splices that into the baseline template.
#[derive(Debug, Clone, Default)]
pub struct RuleYamlParser {
    merger: TemplateMerger,
    overrides: MergeOverrides,
}

impl RuleYamlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `overrides` on top of every merged document.
    pub fn with_overrides(mut self, overrides: MergeOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl FormatParser for RuleYamlParser {
    fn format(&self) -> Format {
        Format::RuleYaml
    }

    fn parse(&self, raw: &RawDocument) -> Result<Vec<u8>, ParseError> {
        let doc = rules::deserialize(raw.bytes())?;
        let fragment = rules::to_fragment(&doc)?;
        tracing::debug!(
            outbounds = fragment.outbounds.len(),
            rules = fragment.rules.len(),
            "converted rule document to fragment"
        );
        let template = Template::global()?;
        Ok(self.merger.merge(template, &fragment, &self.overrides)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MergeError;

    const DOC: &str = r#"
proxies:
  - {name: HK, type: ss, server: hk.example.com, port: 8388, cipher: aes-256-gcm, password: pw}
rules:
  - DOMAIN-SUFFIX,example.com,HK
"#;

    #[test]
    fn test_merges_into_template() {
        let out = RuleYamlParser::new()
            .parse(&RawDocument::new(DOC, false))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"HK\""));
        assert!(text.contains("mixed-in"));
    }

    #[test]
    fn test_deserialize_failure_is_rules_error() {
        let result = RuleYamlParser::new().parse(&RawDocument::new("not: [valid", false));
        assert!(matches!(result, Err(ParseError::Rules(_))));
    }

    #[test]
    fn test_overrides_apply_to_merged_document() {
        let overrides = MergeOverrides::new(serde_json::json!({"log": {"level": "debug"}}));
        let out = RuleYamlParser::new()
            .with_overrides(overrides)
            .parse(&RawDocument::new(DOC, false))
            .unwrap();
        let options = ingest_schema::Options::from_slice(&out).unwrap();
        let log = options.log.as_ref().unwrap();
        assert_eq!(log.level.as_deref(), Some("debug"));
        assert_eq!(log.timestamp, Some(true));
        assert!(options.outbound("HK").is_some());
    }

    #[test]
    fn test_non_canonical_overrides_fail_the_parser() {
        let overrides = MergeOverrides::new(serde_json::json!({"mode": "rule"}));
        let result = RuleYamlParser::new()
            .with_overrides(overrides)
            .parse(&RawDocument::new(DOC, false));
        assert!(matches!(result, Err(ParseError::Merge(MergeError::Overrides(_)))));
    }

    #[test]
    fn test_tag_conflict_is_merge_error() {
        let doc = "proxies:\n  - {name: direct, type: socks5, server: 127.0.0.1, port: 1080}\n";
        let result = RuleYamlParser::new().parse(&RawDocument::new(doc, false));
        assert!(matches!(result, Err(ParseError::Merge(_))));
    }
}
