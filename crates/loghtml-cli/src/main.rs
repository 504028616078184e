//! loghtml CLI
//!
//! Thin wrapper around loghtml-core for shell scripts and maintenance.
//!
//! ## Usage
//!
//! ```bash
//! # Append a message to ./logs/log.html
//! loghtml write "deploy started"
//!
//! # Pick level, color and tags
//! loghtml write --level warning --color orange --tags deploy,db "slow migration"
//!
//! # List the tags used in the active document
//! loghtml tags
//!
//! # Ask a running writer (with signal detection) to switch filter mode
//! loghtml filter on
//!
//! # Close a document left open by a crashed process
//! loghtml finalize
//!
//! # Archive the active document now
//! loghtml --log-dir /var/log/app rotate
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loghtml_core::document::{self, FILTER_OFF_SIGNAL, FILTER_ON_SIGNAL};
use loghtml_core::{HtmlLogger, HtmlWriter, Level, LoggerConfig, Tags};

/// loghtml - live HTML log documents
#[derive(Parser)]
#[command(name = "loghtml")]
#[command(version = "0.1.0")]
#[command(about = "Write to and maintain live HTML log documents")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding the documents (default: logs)
    #[arg(short = 'd', long, global = true)]
    log_dir: Option<PathBuf>,

    /// File name of the active document (default: log.html)
    #[arg(short, long, global = true)]
    file: Option<String>,

    /// JSON logger configuration; --log-dir and --file override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one message
    Write {
        /// Message text (HTML is escaped)
        message: String,

        /// Severity of the message
        #[arg(short, long, value_enum, default_value_t = LevelArg::Info)]
        level: LevelArg,

        /// Font color override (name or #rrggbb)
        #[arg(long)]
        color: Option<String>,

        /// Comma-separated tags (default: the level name)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// List the tags used in the active document
    Tags,

    /// Request filter mode from a running writer
    Filter {
        #[arg(value_enum)]
        state: FilterState,
    },

    /// Close a document that was left open
    Finalize,

    /// Archive the active document and start a fresh one
    Rotate,
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Log,
    Info,
    Debug,
    Warning,
    Error,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Log => Level::Log,
            LevelArg::Info => Level::Info,
            LevelArg::Debug => Level::Debug,
            LevelArg::Warning => Level::Warning,
            LevelArg::Error => Level::Error,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterState {
    On,
    Off,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Load the config file if given, then apply the path overrides.
fn load_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = match &cli.config {
        Some(path) => LoggerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoggerConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        config.log_dir = dir.clone();
    }
    if let Some(file) = &cli.file {
        config.main_filename = file.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Write {
            message,
            level,
            color,
            tags,
        } => {
            let logger = HtmlLogger::new(config)?;
            logger.emit(Level::from(level), message, color.as_deref(), Tags::from(tags));
            logger.close();
            println!("Wrote to {}", logger.path().display());
        }

        Commands::Tags => {
            let path = config.active_path();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for tag in document::used_tags(&content) {
                println!("{}", tag);
            }
        }

        Commands::Filter { state } => {
            let path = config.active_path();
            let mut file = OpenOptions::new()
                .append(true)
                .open(&path)
                .with_context(|| format!("No active document at {}", path.display()))?;
            let (signal, label) = match state {
                FilterState::On => (FILTER_ON_SIGNAL, "on"),
                FilterState::Off => (FILTER_OFF_SIGNAL, "off"),
            };
            writeln!(file, "{}", signal)?;
            println!("Requested filter mode {} in {}", label, path.display());
        }

        Commands::Finalize => {
            let writer = HtmlWriter::new(config)?;
            writer.close();
            println!("Finalized {}", writer.path().display());
        }

        Commands::Rotate => {
            let writer = HtmlWriter::new(config)?;
            writer.rotate();
            writer.close();

            let archives = writer
                .rotation_policy()
                .rotated_files()
                .context("Failed to list rotated documents")?;
            println!("Rotated {}", writer.path().display());
            println!("Archives ({}):", archives.len());
            for path in archives {
                println!("  {}", path.display());
            }
        }
    }

    Ok(())
}
