//! timefind
//!
//! Lists the indexed data files whose time span overlaps a window.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use timefind::config::{LoggingConfig, SourceConfig};
use timefind::index::{parse_time_bound, sort_matches, IndexNode, RangeQuery, SortOrder};
use timefind::logging::init_tracing;
use timefind::span::TimestampFormat;

const TIMESTAMP_HELP: &str = "\
TIMESTAMP must be in one of the following formats:

 RFC 3339     e.g., 2006-01-02T15:04:05.999999999-07:00
 YYYY-MM-DD   e.g., 2006-01-02
 Unix time    e.g., 1445471780, 1234471780.372802000";

#[derive(Parser)]
#[command(name = "timefind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find log files covering a time window")]
#[command(after_help = TIMESTAMP_HELP)]
struct Cli {
    /// Source names, resolved to <SOURCE>.conf.json or <SOURCE>.toml
    sources: Vec<String>,

    /// Path to a configuration file (can be used multiple times)
    #[arg(short, long = "config", value_name = "PATH")]
    configs: Vec<PathBuf>,

    /// Begin interval at timestamp
    #[arg(short, long, value_name = "TIMESTAMP", default_value = "")]
    begin: String,

    /// End interval at timestamp
    #[arg(short, long, value_name = "TIMESTAMP", default_value = "")]
    end: String,

    /// Output the start and end time for each path as Unix time
    #[arg(short = 't', long, conflicts_with = "human")]
    times: bool,

    /// Output human-readable start and end time for each path
    #[arg(short = 'T', long)]
    human: bool,

    /// Output order: path or earliest
    #[arg(long, default_value = "path")]
    sort: SortOrder,

    /// Verbose progress indicators and messages
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&LoggingConfig::from_env(cli.verbose)).context("Failed to initialize logging")?;

    if cli.sources.is_empty() && cli.configs.is_empty() {
        bail!("no sources given; pass SOURCE names or -c PATH");
    }

    let begin = parse_time_bound(&cli.begin)
        .with_context(|| format!("could not parse begin timestamp {:?}", cli.begin))?;
    let end = parse_time_bound(&cli.end)
        .with_context(|| format!("could not parse end timestamp {:?}", cli.end))?;
    let query = RangeQuery::between(begin, end)?;
    tracing::debug!(?begin, ?end, "Searching");

    let times = match (cli.times, cli.human) {
        (true, _) => Some(TimestampFormat::Unix),
        (_, true) => Some(TimestampFormat::Rfc3339),
        _ => None,
    };

    let mut configs = Vec::new();
    for path in &cli.configs {
        configs.push(
            SourceConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        );
    }
    for name in &cli.sources {
        configs.push(SourceConfig::discover(name).with_context(|| format!("loading source {name}"))?);
    }

    for source in configs {
        let name = source.name.clone();
        let root = IndexNode::open(Arc::new(source));

        let mut matches = query.run(&root);
        sort_matches(&mut matches, cli.sort);
        tracing::debug!(source = %name, matches = matches.len(), "Query complete");

        for m in &matches {
            println!("{}", m.format_line(times));
        }
    }

    Ok(())
}
