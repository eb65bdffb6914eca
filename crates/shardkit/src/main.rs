use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use shardkit::{config::Config, graph::ModuleGraph, split_graph};

/// Split a bundler module graph into shards
#[derive(Parser, Debug)]
#[command(name = "shardkit", version, about, long_about = None)]
struct Cli {
    /// Module graph as JSON: `{ "roots": [...], "modules": [...] }`
    #[arg(long)]
    graph: PathBuf,

    /// Splitter configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output path of the main shard, overrides the configuration
    #[arg(long)]
    dest: Option<String>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = match &cli.config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };

    let splitters = config.splitters()?;
    let mut options = config.split_options();
    if let Some(dest) = cli.dest {
        options.main_dest = Some(dest);
    }

    let (roots, cache) = ModuleGraph::load(&cli.graph)?.into_cache();
    info!(
        "Loaded {} modules with {} roots and {} splitters",
        cache.len(),
        roots.len(),
        splitters.len()
    );

    let result = split_graph(&cache, &roots, &splitters, &options)?;
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;

    match &cli.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write result: {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("Failed to write result to stdout")?;
        }
    }

    Ok(())
}
