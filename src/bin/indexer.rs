//! timefind-indexer
//!
//! Brings the index of one or more sources up to date:
//! - extracts time spans from new and modified files
//! - drops entries for files that disappeared
//! - rewrites the index files that changed

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use timefind::config::{generate_example_config, LoggingConfig, SourceConfig};
use timefind::index::{Indexer, UpdateOptions};
use timefind::logging::init_tracing;

#[derive(Parser)]
#[command(name = "timefind-indexer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Update timefind indexes")]
struct Cli {
    /// Source names, resolved to <SOURCE>.conf.json or <SOURCE>.toml
    sources: Vec<String>,

    /// Path to a configuration file (can be used multiple times)
    #[arg(short, long = "config", value_name = "PATH")]
    configs: Vec<PathBuf>,

    /// Worker threads (default: one per CPU)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Process files one at a time
    #[arg(long)]
    sequential: bool,

    /// Log progress every N extracted files (0 disables)
    #[arg(long, value_name = "N", default_value = "1000")]
    progress: usize,

    /// Verbose progress indicators and messages
    #[arg(short, long)]
    verbose: bool,

    /// Print an example source configuration and exit
    #[arg(long)]
    example_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.example_config {
        print!("{}", generate_example_config());
        return Ok(());
    }

    init_tracing(&LoggingConfig::from_env(cli.verbose)).context("Failed to initialize logging")?;

    if cli.sources.is_empty() && cli.configs.is_empty() {
        bail!("no sources given; pass SOURCE names or -c PATH");
    }

    let mut configs = Vec::new();
    for path in &cli.configs {
        configs.push(
            SourceConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        );
    }
    for name in &cli.sources {
        configs.push(SourceConfig::discover(name).with_context(|| format!("loading source {name}"))?);
    }

    let indexer = Indexer::new(UpdateOptions {
        parallel: !cli.sequential,
        threads: cli.threads,
        progress_interval: cli.progress,
    });

    tracing::info!("timefind-indexer v{}", env!("CARGO_PKG_VERSION"));

    for source in &configs {
        tracing::info!(
            source = %source.name,
            format = %source.format,
            index_dir = ?source.index_dir,
            "Updating index"
        );
        indexer
            .run(source)
            .with_context(|| format!("updating source {}", source.name))?;
    }

    Ok(())
}
