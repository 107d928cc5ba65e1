//! proxy-ingest CLI
//!
//! Entry point for the `proxy-ingest` command-line tool.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use proxy_ingest::config::{default_settings_path, EffectiveSettings, LogFormat};
use proxy_ingest::signal::SignalHandler;
use proxy_ingest::validate::{ConfigChecker, EngineChecker, ValidationError};
use proxy_ingest::{logging, Invocation, Pipeline, PipelineError};

#[derive(Parser)]
#[command(name = "proxy-ingest")]
#[command(about = "Detect, convert, validate and commit proxy configuration", version)]
struct Cli {
    /// Settings file (default: ~/.config/proxy-ingest/config.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured log format
    #[arg(long, global = true, value_enum)]
    log_format: Option<CliLogFormat>,

    /// Surface every parser's rejection
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Compact => LogFormat::Compact,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert, validate and atomically write a configuration
    Parse {
        /// Input file of unknown format
        #[arg(long, short = 's')]
        source: PathBuf,

        /// Where the canonical configuration is written
        #[arg(long, short = 'd')]
        dest: PathBuf,

        /// Permission bits for the written file, in octal (e.g. 600)
        #[arg(long)]
        mode: Option<String>,

        /// Output the report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Convert and validate, printing the result instead of writing it
    Convert {
        #[arg(long, short = 's')]
        source: PathBuf,
    },

    /// Validate an existing canonical configuration
    Check {
        path: PathBuf,
    },

    /// Show the sniffed hint and which parser accepts the input
    Detect {
        #[arg(long, short = 's')]
        source: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings and where they came from
    Settings,
}

fn main() {
    let cli = Cli::parse();

    let mode = match &cli.command {
        Commands::Parse { mode: Some(m), .. } => match u32::from_str_radix(m, 8) {
            Ok(bits) => Some(bits),
            Err(_) => {
                eprintln!("Invalid --mode '{}': expected octal permission bits", m);
                process::exit(1);
            }
        },
        _ => None,
    };

    let effective = match load_settings(&cli, mode) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(&effective.settings.log, cli.debug) {
        eprintln!("Error initializing logging: {}", e);
    }

    let debug = cli.debug;
    match cli.command {
        Commands::Parse {
            source, dest, json, ..
        } => run_parse(effective, source, dest, debug, json),
        Commands::Convert { source } => run_convert(effective, &source, debug),
        Commands::Check { path } => run_check(&path),
        Commands::Detect { source, json } => run_detect(effective, &source, debug, json),
        Commands::Settings => run_settings(&effective),
    }
}

fn load_settings(cli: &Cli, mode: Option<u32>) -> Result<EffectiveSettings, proxy_ingest::SettingsError> {
    let path = cli.settings.clone().or_else(default_settings_path);

    let mut overrides = serde_json::Map::new();
    let mut log = serde_json::Map::new();
    if let Some(level) = &cli.log_level {
        log.insert("level".to_string(), level.clone().into());
    }
    if let Some(format) = cli.log_format {
        log.insert("format".to_string(), LogFormat::from(format).to_string().into());
    }
    if !log.is_empty() {
        overrides.insert("log".to_string(), log.into());
    }
    if let Some(bits) = mode {
        overrides.insert("file_mode".to_string(), bits.into());
    }

    let overrides = (!overrides.is_empty()).then(|| serde_json::Value::Object(overrides));
    EffectiveSettings::build(path.as_deref(), overrides)
}

/// SIGINT/SIGTERM cancel `pipeline` at its next stage boundary.
fn install_signal_handler(pipeline: &Pipeline) {
    if let Err(e) = SignalHandler::for_pipeline(pipeline).install() {
        tracing::warn!(error = %e, "failed to install signal handler");
    }
}

fn fail(error: PipelineError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}

fn run_parse(effective: EffectiveSettings, source: PathBuf, dest: PathBuf, debug: bool, json: bool) {
    let pipeline = Pipeline::new(effective.settings);
    install_signal_handler(&pipeline);

    let invocation = Invocation {
        source,
        dest,
        debug,
    };
    let report = match pipeline.run(&invocation) {
        Ok(r) => r,
        Err(e) => fail(e),
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("Committed {}", report.receipt.path.display());
        println!("  Format: {}", report.format);
        println!("  Bytes:  {}", report.receipt.len);
        println!("  SHA256: {}", report.receipt.sha256);
    }
}

fn run_convert(effective: EffectiveSettings, source: &Path, debug: bool) {
    let pipeline = Pipeline::new(effective.settings);
    install_signal_handler(&pipeline);
    let conversion = pipeline
        .read_source(source, debug)
        .and_then(|raw| pipeline.convert(&raw))
        .unwrap_or_else(|e| fail(e));

    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(&conversion.bytes).and_then(|_| stdout.flush()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn run_check(path: &Path) {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    match EngineChecker.check(&bytes) {
        Ok(()) => println!("Configuration valid: {}", path.display()),
        Err(ValidationError::Check(e)) if !e.issues().is_empty() => {
            eprintln!("Configuration invalid: {}", path.display());
            for issue in e.issues() {
                eprintln!("  {}", issue);
            }
            process::exit(20);
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            process::exit(20);
        }
    }
}

fn run_detect(effective: EffectiveSettings, source: &Path, debug: bool, json: bool) {
    let pipeline = Pipeline::new(effective.settings);
    let raw = pipeline
        .read_source(source, debug)
        .unwrap_or_else(|e| fail(e));

    let outcome = match pipeline.chain().run(&raw) {
        Ok(o) => o,
        Err(e) => fail(e.into()),
    };

    if json {
        let output = serde_json::json!({
            "hint": outcome.hint,
            "format": outcome.format,
            "index": outcome.index,
        });
        println!("{}", output);
    } else {
        println!("Hint:   {}", outcome.hint);
        println!("Parser: {} (#{})", outcome.format, outcome.index);
    }
}

fn run_settings(effective: &EffectiveSettings) {
    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
