//! Pipeline orchestration
//!
//! One invocation reads the source once, runs the parser chain, validates
//! the winning candidate, then commits it atomically:
//!
//! `Start → Parsing(i) → {Parsing(i+1) | Merged | Failed}`,
//! `Merged → Validating → {Committed | Failed}`.
//!
//! Any failure ends the invocation with the destination untouched. The
//! cancellation token is checked at stage boundaries only.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancel::{CancellationToken, Cancelled};
use crate::chain::{ChainError, ParserChain};
use crate::commit::{AtomicCommitter, CommitError, CommitReceipt};
use crate::config::{Settings, SettingsError};
use crate::parser::{Format, FormatHint, ParseError, RawDocument};
use crate::signal::EXIT_CODE_CANCELLED;
use crate::validate::{ConfigChecker, EngineChecker, ValidationError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input is {size} bytes, limit is {limit}")]
    InputTooLarge { size: u64, limit: u64 },

    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("cancelled")]
    Cancelled(#[from] Cancelled),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Read { .. } => 1,
            PipelineError::InputTooLarge { .. } => 1,
            PipelineError::Settings(_) => 1,
            PipelineError::Chain(e) => match e.primary() {
                Some(ParseError::Merge(_)) => 11,
                _ => 10,
            },
            PipelineError::Validation(_) => 20,
            PipelineError::Commit(_) => 30,
            PipelineError::Cancelled(_) => EXIT_CODE_CANCELLED,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline states, in the order an invocation visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    /// Parser at this chain index is running.
    Parsing(usize),
    /// A candidate exists (merged with the template where needed).
    Merged,
    Validating,
    Committed,
    Failed,
}

/// Paths and flags for one run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub debug: bool,
}

/// A validated candidate that has not been written anywhere.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub format: Format,
    pub hint: FormatHint,
    pub bytes: Vec<u8>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub format: Format,
    pub hint: FormatHint,
    pub stages: Vec<Stage>,
    pub receipt: CommitReceipt,
}

#[derive(Debug, Default)]
struct Progress {
    stages: Vec<Stage>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        tracing::debug!(?stage, "pipeline stage");
        self.stages.push(stage);
    }
}

pub struct Pipeline {
    chain: ParserChain,
    checker: Box<dyn ConfigChecker>,
    committer: AtomicCommitter,
    settings: Settings,
    token: CancellationToken,
}

impl Pipeline {
    /// Standard chain, engine checker, committer using `settings.file_mode`.
    pub fn new(settings: Settings) -> Self {
        Self {
            chain: ParserChain::standard(),
            checker: Box::new(EngineChecker),
            committer: AtomicCommitter::new(settings.file_mode),
            settings,
            token: CancellationToken::new(),
        }
    }

    pub fn with_chain(mut self, chain: ParserChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_checker(mut self, checker: impl ConfigChecker + 'static) -> Self {
        self.checker = Box::new(checker);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chain(&self) -> &ParserChain {
        &self.chain
    }

    /// Read the whole source file, enforcing `max_input_bytes`.
    pub fn read_source(&self, path: &Path, debug: bool) -> PipelineResult<RawDocument> {
        let read_err = |source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        };
        let limit = self.settings.max_input_bytes;

        let size = fs::metadata(path).map_err(read_err)?.len();
        if size > limit {
            return Err(PipelineError::InputTooLarge { size, limit });
        }

        let bytes = fs::read(path).map_err(read_err)?;
        if bytes.len() as u64 > limit {
            return Err(PipelineError::InputTooLarge {
                size: bytes.len() as u64,
                limit,
            });
        }
        Ok(RawDocument::new(bytes, debug))
    }

    /// Parse and validate without committing.
    pub fn convert(&self, raw: &RawDocument) -> PipelineResult<Conversion> {
        let mut progress = Progress::default();
        progress.enter(Stage::Start);
        let result = self.convert_tracked(raw, &mut progress);
        if result.is_err() {
            progress.enter(Stage::Failed);
        }
        let (format, hint, bytes) = result?;
        Ok(Conversion {
            format,
            hint,
            bytes,
            stages: progress.stages,
        })
    }

    /// Full pipeline: read, parse, validate, commit.
    pub fn run(&self, invocation: &Invocation) -> PipelineResult<PipelineReport> {
        tracing::info!(
            source = %invocation.source.display(),
            dest = %invocation.dest.display(),
            debug = invocation.debug,
            "starting pipeline"
        );

        let raw = self.read_source(&invocation.source, invocation.debug)?;

        let mut progress = Progress::default();
        progress.enter(Stage::Start);
        let result = self.run_tracked(&raw, &invocation.dest, &mut progress);
        match result {
            Ok((format, hint, receipt)) => {
                tracing::info!(
                    %format,
                    path = %receipt.path.display(),
                    bytes = receipt.len,
                    sha256 = %receipt.sha256,
                    "configuration committed"
                );
                Ok(PipelineReport {
                    format,
                    hint,
                    stages: progress.stages,
                    receipt,
                })
            }
            Err(e) => {
                progress.enter(Stage::Failed);
                tracing::warn!(error = %e, "pipeline failed, destination left untouched");
                Err(e)
            }
        }
    }

    fn run_tracked(
        &self,
        raw: &RawDocument,
        dest: &Path,
        progress: &mut Progress,
    ) -> PipelineResult<(Format, FormatHint, CommitReceipt)> {
        let (format, hint, bytes) = self.convert_tracked(raw, progress)?;

        self.token.check()?;
        let receipt = self.committer.commit(dest, &bytes)?;
        progress.enter(Stage::Committed);
        Ok((format, hint, receipt))
    }

    fn convert_tracked(
        &self,
        raw: &RawDocument,
        progress: &mut Progress,
    ) -> PipelineResult<(Format, FormatHint, Vec<u8>)> {
        self.token.check()?;
        let outcome = self
            .chain
            .run_observed(raw, |index, _| progress.enter(Stage::Parsing(index)))?;
        progress.enter(Stage::Merged);
        if self.settings.sniff {
            tracing::info!(hint = %outcome.hint, format = %outcome.format, "input format");
        }

        self.token.check()?;
        progress.enter(Stage::Validating);
        self.checker.check(&outcome.bytes)?;

        Ok((outcome.format, outcome.hint, outcome.bytes))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

/// Convert the file at `source` and commit it to `dest` with default settings.
pub fn parse_config(dest: &Path, source: &Path, debug: bool) -> PipelineResult<PipelineReport> {
    Pipeline::default().run(&Invocation {
        source: source.to_path_buf(),
        dest: dest.to_path_buf(),
        debug,
    })
}
