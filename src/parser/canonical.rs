//! Native canonical documents, passed through unchanged.

use ingest_schema::Options;

use super::{Format, FormatParser, ParseError, RawDocument};

/// Accepts input that strictly deserializes as canonical options.
///
/// Only structure is checked here. Semantic checks run later, in the
/// validator, like for every other format.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalParser;

impl FormatParser for CanonicalParser {
    fn format(&self) -> Format {
        Format::Canonical
    }

    fn parse(&self, raw: &RawDocument) -> Result<Vec<u8>, ParseError> {
        Options::from_slice(raw.bytes())?;
        Ok(raw.bytes().to_vec())
    }
}
