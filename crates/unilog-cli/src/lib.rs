//! unilog command-line inspector
//!
//! This library provides the argument parsing and command handlers behind the
//! `unilog` binary. Handlers write to any [`std::io::Write`] so they can be
//! driven from tests without spawning the binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::Level;
use uuid::Uuid;

/// Inspect Apple Unified Logging uuidtext and tracev3 files
#[derive(Debug, Parser)]
#[command(
    name = "unilog",
    about = "Inspect Apple Unified Logging uuidtext and tracev3 files",
    version,
    long_about = "A command-line tool for dumping the structure of the files logd writes: uuidtext format string files and tracev3 trace files."
)]
pub struct Cli {
    /// Set the logging level (overridden by RUST_LOG)
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "UNILOG_LOG_LEVEL",
        default_value = "warn"
    )]
    pub log_level: LogLevel,

    /// Output format
    #[arg(
        short = 'o',
        long,
        value_enum,
        global = true,
        env = "UNILOG_FORMAT",
        default_value = "text"
    )]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Logging level accepted on the command line
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Everything, including per-block decompression events
    Trace,
    /// Structure-level parse events
    Debug,
    /// Informational messages
    Info,
    /// Soft inconsistencies in the input
    Warn,
    /// Errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Output format
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Dump a uuidtext file and optionally resolve one format string
    Uuidtext {
        /// Path to the uuidtext file
        file: PathBuf,

        /// Virtual offset of a format string to resolve (decimal or 0x hex)
        #[arg(long, value_parser = parse_offset)]
        offset: Option<u32>,

        /// List every format string in the file
        #[arg(long)]
        strings: bool,
    },

    /// Resolve a format string by image UUID below a uuidtext directory
    Resolve {
        /// uuidtext root directory, e.g. /private/var/db/uuidtext
        dir: PathBuf,

        /// Image UUID
        uuid: Uuid,

        /// Virtual offset of the format string (decimal or 0x hex)
        #[arg(value_parser = parse_offset)]
        offset: u32,
    },

    /// Dump the header, catalogs and chunksets of a tracev3 file
    Tracev3 {
        /// Path to the tracev3 file
        file: PathBuf,

        /// List the chunks inside every chunkset
        #[arg(long)]
        chunks: bool,
    },
}

/// Parse a decimal or `0x`-prefixed hexadecimal offset
pub fn parse_offset(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{value}': {e}"))
}

/// Run a parsed command line, writing the report to `out`
pub fn run(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Uuidtext {
            file,
            offset,
            strings,
        } => commands::uuidtext::handle(file, *offset, *strings, cli.format, out),
        Commands::Resolve { dir, uuid, offset } => {
            commands::resolve::handle(dir, uuid, *offset, cli.format, out)
        }
        Commands::Tracev3 { file, chunks } => {
            commands::tracev3::handle(file, *chunks, cli.format, out)
        }
    }
}
