//! Tracing subscriber setup
//!
//! Logs go to stderr so `convert` can stream the document on stdout.
//! `RUST_LOG` wins over the configured level.

use std::io;

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LogSettings};

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(settings: &LogSettings, debug: bool) -> String {
    let level = if debug { "debug" } else { settings.level.as_str() };
    format!("proxy_ingest={level},ingest_convert={level},ingest_schema={level},warn")
}

pub fn init(settings: &LogSettings, debug: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(settings, debug)));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let settings = LogSettings {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        };
        assert_eq!(
            default_directive(&settings, false),
            "proxy_ingest=warn,ingest_convert=warn,ingest_schema=warn,warn"
        );
        assert!(default_directive(&settings, true).starts_with("proxy_ingest=debug,"));
    }
}
