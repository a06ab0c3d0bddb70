//! dirwatch - print changes under one or more directories

use anyhow::{Context, Result};
use clap::Parser;
use dirwatch::WatcherConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

mod output;
mod watch;

/// Watch directories and print batched, coalesced changes
#[derive(Parser, Debug)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directories to watch
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Batching latency in milliseconds (default: 100)
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Watch subdirectories too
    #[arg(short, long)]
    recursive: bool,

    /// Ignore pattern in gitignore syntax (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// TOML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print one JSON object per event
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// File values first, then flags on top
    fn watcher_config(&self) -> Result<WatcherConfig> {
        let base = match &self.config {
            Some(path) => WatcherConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => WatcherConfig::default(),
        };

        let latency = self
            .latency_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| base.latency());
        let ignore: Vec<String> = base
            .ignore()
            .iter()
            .cloned()
            .chain(self.ignore.iter().cloned())
            .collect();

        let config = WatcherConfig::new(latency, self.recursive || base.recursive()).with_ignore(ignore);
        config.validate().context("Invalid watcher configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let config = cli.watcher_config()?;
    let format = if cli.json {
        output::Format::Json
    } else {
        output::Format::Human
    };

    watch::run(
        cli.paths.clone(),
        config,
        format,
        cli.duration.map(Duration::from_secs),
    )
}
