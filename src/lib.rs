//! proxy-ingest: turn a proxy configuration of unknown format into one
//! validated canonical document.
//!
//! The input is tried against an ordered parser chain (canonical JSON, share
//! links, rule-routing YAML). The first parser that accepts it wins. Its
//! candidate is validated by the engine checker and committed atomically, so
//! the destination holds either its previous content or a valid document.

pub mod cancel;
pub mod chain;
pub mod commit;
pub mod config;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod signal;
pub mod template;
pub mod validate;

pub use cancel::CancellationToken;
pub use chain::{ChainError, ChainOutcome, ParserChain};
pub use commit::{AtomicCommitter, CommitError, CommitReceipt};
pub use config::{EffectiveSettings, Settings, SettingsError};
pub use parser::{Format, FormatHint, FormatParser, ParseError, RawDocument};
pub use pipeline::{parse_config, Invocation, Pipeline, PipelineError, PipelineReport, Stage};
pub use template::{MergeError, MergeOverrides, Template, TemplateMerger};
pub use validate::{ConfigChecker, EngineChecker, ValidationError};
