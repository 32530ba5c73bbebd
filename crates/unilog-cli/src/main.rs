//! unilog binary entry point
//!
//! Parses the command line, initializes logging on stderr and runs the
//! selected command with its report on stdout.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use unilog_cli::{Cli, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log-level
    let default_level = Level::from(cli.log_level).to_string().to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)
}
