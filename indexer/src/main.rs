use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sift_core::scan::build_with_report;
use sift_core::{search, CancellationToken, Corpus, LoaderRegistry, SearchConfig};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Index a directory of text files and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and print its statistics
    Stats {
        /// Directory to index
        #[arg(long, env = "CONTENT_ROOT")]
        root: PathBuf,
    },
    /// Build the index and run one query against it
    Search {
        /// Directory to index
        #[arg(long, env = "CONTENT_ROOT")]
        root: PathBuf,
        /// Query text; supports ^must !mustnot *important and a ~ b
        query: String,
        /// Maximum number of results to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print the full result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { root } => stats(&root),
        Commands::Search { root, query, limit, json } => run_query(&root, &query, limit, json),
    }
}

fn load(root: &Path) -> Result<Corpus> {
    let started = Instant::now();
    let (corpus, report) = build_with_report(root, &LoaderRegistry::standard(), &CancellationToken::new())
        .with_context(|| format!("indexing {}", root.display()))?;
    tracing::info!(
        indexed = report.indexed,
        unsupported = report.unsupported,
        failed = report.failed,
        took_ms = started.elapsed().as_millis() as u64,
        "loaded corpus"
    );
    Ok(corpus)
}

fn stats(root: &Path) -> Result<()> {
    let corpus = load(root)?;
    println!("documents: {}", corpus.num_documents());
    println!("terms:     {}", corpus.num_terms());
    println!("aliases:   {}", corpus.num_aliases());
    Ok(())
}

fn run_query(root: &Path, query: &str, limit: usize, json: bool) -> Result<()> {
    let corpus = load(root)?;
    let started = Instant::now();
    let mut result = search(&corpus, query, &SearchConfig::default(), &CancellationToken::new())?;
    let took = started.elapsed().as_secs_f64();
    result.items.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{} results in {:.4}s", result.len(), took);
    if let Some(suggestion) = &result.suggestion {
        println!("did you mean: {suggestion}");
    }
    for (rank, item) in result.items.iter().enumerate() {
        println!("{:>3}. {} ({:.3})", rank + 1, item.title, item.score);
        println!("     {}", item.snippet.replace('\n', " "));
    }
    Ok(())
}
