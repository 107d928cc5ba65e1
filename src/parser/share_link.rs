//! Share links and subscriptions.

use ingest_convert::sharelink;

use super::{Format, FormatParser, ParseError, RawDocument};

/// Decodes share links into a freshly built canonical document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareLinkParser;

impl FormatParser for ShareLinkParser {
    fn format(&self) -> Format {
        Format::ShareLink
    }

    fn parse(&self, raw: &RawDocument) -> Result<Vec<u8>, ParseError> {
        let text = raw.text()?;
        let converted = sharelink::convert(text)?;
        Ok(converted.into_bytes())
    }
}
