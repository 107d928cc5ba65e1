//! Fallback chain driver
//!
//! Parsers run strictly in order against the same input. The first success
//! wins and later parsers are never invoked. If every parser fails, all
//! attempts are returned with the last one as the primary error.

use std::fmt;

use crate::parser::{
    sniff, CanonicalParser, Format, FormatHint, FormatParser, ParseError, RawDocument,
    RuleYamlParser, ShareLinkParser,
};

/// One failed parser attempt.
#[derive(Debug)]
pub struct Attempt {
    pub index: usize,
    pub format: Format,
    pub error: ParseError,
}

/// Every parser rejected the input.
#[derive(Debug)]
pub struct ChainError {
    pub attempts: Vec<Attempt>,
}

impl ChainError {
    /// The error of the last parser tried.
    pub fn primary(&self) -> Option<&ParseError> {
        self.attempts.last().map(|a| &a.error)
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(last) = self.attempts.last() else {
            return f.write_str("no parsers configured");
        };
        write!(f, "no parser accepted the input: {}: {}", last.format, last.error)?;
        if self.attempts.len() > 1 {
            let tried: Vec<String> = self
                .attempts
                .iter()
                .map(|a| format!("{}: {}", a.format, a.error))
                .collect();
            write!(f, " (tried {})", tried.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.primary().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// The winning parser and its candidate bytes.
#[derive(Debug)]
pub struct ChainOutcome {
    pub format: Format,
    /// Position of the winning parser in the chain.
    pub index: usize,
    pub bytes: Vec<u8>,
    pub hint: FormatHint,
}

/// Ordered parser list, fixed at construction.
pub struct ParserChain {
    parsers: Vec<Box<dyn FormatParser>>,
}

impl ParserChain {
    pub fn new(parsers: Vec<Box<dyn FormatParser>>) -> Self {
        Self { parsers }
    }

    /// Canonical, then share links, then rule-routing YAML.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(CanonicalParser),
            Box::new(ShareLinkParser),
            Box::new(RuleYamlParser::new()),
        ])
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Formats in chain order.
    pub fn formats(&self) -> Vec<Format> {
        self.parsers.iter().map(|p| p.format()).collect()
    }

    pub fn run(&self, raw: &RawDocument) -> Result<ChainOutcome, ChainError> {
        self.run_observed(raw, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `observe` before each parser starts.
    pub fn run_observed<F>(&self, raw: &RawDocument, mut observe: F) -> Result<ChainOutcome, ChainError>
    where
        F: FnMut(usize, Format),
    {
        let hint = sniff(raw.bytes());
        tracing::debug!(
            %hint,
            likely = hint.likely_format().map(|f| f.as_str()).unwrap_or("none"),
            bytes = raw.len(),
            "sniffed input"
        );

        let mut attempts = Vec::new();
        for (index, parser) in self.parsers.iter().enumerate() {
            let format = parser.format();
            observe(index, format);

            match parser.parse(raw) {
                Ok(bytes) => {
                    tracing::info!(parser = %format, index, bytes = bytes.len(), "parser accepted input");
                    if hint.likely_format().is_some_and(|f| f != format) {
                        tracing::debug!(%hint, parser = %format, "sniff hint disagreed with chain");
                    }
                    return Ok(ChainOutcome {
                        format,
                        index,
                        bytes,
                        hint,
                    });
                }
                Err(error) => {
                    if raw.debug() {
                        tracing::info!(parser = %format, index, %error, "parser rejected input");
                    } else {
                        tracing::debug!(parser = %format, index, %error, "parser rejected input");
                    }
                    attempts.push(Attempt {
                        index,
                        format,
                        error,
                    });
                }
            }
        }

        Err(ChainError { attempts })
    }
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ParserChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserChain")
            .field("formats", &self.formats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        format: Format,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FormatParser for Scripted {
        fn format(&self) -> Format {
            self.format
        }

        fn parse(&self, _raw: &RawDocument) -> Result<Vec<u8>, ParseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(self.format.as_str().as_bytes().to_vec())
            } else {
                Err(ParseError::Other(format!("{} said no", self.format)))
            }
        }
    }

    fn chain(script: &[(Format, bool)]) -> (ParserChain, Vec<Arc<AtomicUsize>>) {
        let counters: Vec<_> = script.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let parsers = script
            .iter()
            .zip(&counters)
            .map(|(&(format, succeed), calls)| {
                Box::new(Scripted {
                    format,
                    succeed,
                    calls: Arc::clone(calls),
                }) as Box<dyn FormatParser>
            })
            .collect();
        (ParserChain::new(parsers), counters)
    }

    fn calls(counters: &[Arc<AtomicUsize>]) -> Vec<usize> {
        counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    #[test]
    fn test_first_success_stops_chain() {
        let (chain, counters) = chain(&[
            (Format::Canonical, false),
            (Format::ShareLink, true),
            (Format::RuleYaml, true),
        ]);
        let outcome = chain.run(&RawDocument::new("x", false)).unwrap();
        assert_eq!(outcome.format, Format::ShareLink);
        assert_eq!(outcome.index, 1);
        assert_eq!(outcome.bytes, b"share-link");
        assert_eq!(calls(&counters), vec![1, 1, 0]);
    }

    #[test]
    fn test_all_fail_keeps_every_attempt() {
        let (chain, counters) = chain(&[
            (Format::Canonical, false),
            (Format::ShareLink, false),
            (Format::RuleYaml, false),
        ]);
        let err = chain.run(&RawDocument::new("x", true)).unwrap_err();
        assert_eq!(err.attempts.len(), 3);
        assert_eq!(calls(&counters), vec![1, 1, 1]);

        let message = err.to_string();
        assert!(message.starts_with("no parser accepted the input: rule-yaml: rule-yaml said no"));
        assert!(message.contains("canonical: canonical said no"));
        assert!(matches!(err.primary(), Some(ParseError::Other(m)) if m == "rule-yaml said no"));
    }

    #[test]
    fn test_observer_sees_each_attempt() {
        let (chain, _) = chain(&[(Format::Canonical, false), (Format::RuleYaml, true)]);
        let mut seen = Vec::new();
        chain
            .run_observed(&RawDocument::new("x", false), |i, f| seen.push((i, f)))
            .unwrap();
        assert_eq!(seen, vec![(0, Format::Canonical), (1, Format::RuleYaml)]);
    }

    #[test]
    fn test_empty_chain() {
        let err = ParserChain::new(Vec::new())
            .run(&RawDocument::new("x", false))
            .unwrap_err();
        assert!(err.primary().is_none());
        assert_eq!(err.to_string(), "no parsers configured");
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            ParserChain::standard().formats(),
            vec![Format::Canonical, Format::ShareLink, Format::RuleYaml]
        );
    }

    #[test]
    fn test_hint_does_not_reorder() {
        // looks like YAML, but canonical still runs first and wins
        let (chain, counters) = chain(&[(Format::Canonical, true), (Format::RuleYaml, true)]);
        let outcome = chain.run(&RawDocument::new("proxies: []", false)).unwrap();
        assert_eq!(outcome.hint, FormatHint::Yaml);
        assert_eq!(outcome.format, Format::Canonical);
        assert_eq!(calls(&counters), vec![1, 0]);
    }
}
