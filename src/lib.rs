pub mod catalog;
pub mod config;
pub mod evaluation;
pub mod indexer;
pub mod model;
pub mod search;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use config::Config;
use indexer::IndexOptions;
use search::Recommender;
use search::embedder_registry::EmbedderRegistry;
use search::vector_index::Quantization;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "assay",
    version,
    about = "Assessment recommendations from a semantic catalog index"
)]
pub struct Cli {
    /// Override data dir (index + metadata). Defaults to platform data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vector index and metadata table from a raw catalog file
    Index {
        /// Raw catalog file (JSON array of assessment records)
        catalog: PathBuf,

        /// Embedder name or id (defaults to the best available)
        #[arg(long)]
        embedder: Option<String>,

        /// Store vectors as f16 (half the index size, negligible rank drift)
        #[arg(long)]
        f16: bool,

        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Recommend assessments for a natural-language query
    Recommend {
        /// Query text (e.g. "java developer with strong teamwork")
        query: String,

        /// Maximum number of recommendations
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Embedder name or id (must match the one the index was built with)
        #[arg(long)]
        embedder: Option<String>,

        /// Emit results as JSON instead of a formatted list
        #[arg(long)]
        json: bool,
    },
    /// Evaluate recommendation quality and write a CSV report
    Evaluate {
        /// Batch query file (one query per line); omit to self-evaluate
        /// against the whole catalog with recall@k
        #[arg(long)]
        queries: Option<PathBuf>,

        /// CSV report destination
        #[arg(long, default_value = "predictions.csv")]
        output: PathBuf,

        /// Recommendations per query (the k of recall@k)
        #[arg(long, short = 'k', default_value_t = 10)]
        top_k: usize,

        /// Embedder name or id (must match the one the index was built with)
        #[arg(long)]
        embedder: Option<String>,

        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// List registered embedders and their availability
    Embedders,
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.data_dir)?;

    match cli.command {
        Commands::Index {
            catalog,
            embedder,
            f16,
            quiet,
        } => run_index_command(&config, catalog, embedder, f16, quiet),
        Commands::Recommend {
            query,
            top_k,
            embedder,
            json,
        } => run_recommend_command(&config, &query, top_k, embedder, json),
        Commands::Evaluate {
            queries,
            output,
            top_k,
            embedder,
            quiet,
        } => run_evaluate_command(&config, queries, output, top_k, embedder, quiet),
        Commands::Embedders => run_embedders_command(&config),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "assay", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn run_index_command(
    config: &Config,
    catalog: PathBuf,
    embedder: Option<String>,
    f16: bool,
    quiet: bool,
) -> Result<()> {
    let options = IndexOptions {
        catalog_path: catalog,
        data_dir: config.data_dir.clone(),
        embedder: embedder.or_else(|| config.embedder.clone()),
        quantization: if f16 {
            Quantization::F16
        } else {
            Quantization::F32
        },
        quiet,
    };
    let summary = indexer::run_index(&options)?;
    println!(
        "Indexed {} assessments with embedder {} -> {}",
        summary.items_indexed,
        summary.embedder_id,
        summary.index_path.display()
    );
    Ok(())
}

fn run_recommend_command(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    embedder: Option<String>,
    json: bool,
) -> Result<()> {
    let final_k = top_k.unwrap_or(config.final_k);
    let embedder_name = embedder.or_else(|| config.embedder.clone());

    let recommender = Recommender::open(&config.data_dir, embedder_name.as_deref())?;
    let retrieve_k = config.retrieve_k.max(final_k);
    let results = recommender.recommend_with_pool(query, retrieve_k, final_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching assessments found.");
        return Ok(());
    }
    for (rank, item) in results.iter().enumerate() {
        println!(
            "{:>2}. {} {}",
            rank + 1,
            item.name.bold(),
            format!("[{:?}]", item.category_code).dimmed()
        );
        if !item.url.is_empty() {
            println!("    {}", item.url.blue());
        }
        if item.duration_minutes > 0 {
            println!("    {} min", item.duration_minutes);
        }
    }
    Ok(())
}

fn run_evaluate_command(
    config: &Config,
    queries: Option<PathBuf>,
    output: PathBuf,
    top_k: usize,
    embedder: Option<String>,
    quiet: bool,
) -> Result<()> {
    let options = evaluation::EvalOptions {
        data_dir: config.data_dir.clone(),
        embedder: embedder.or_else(|| config.embedder.clone()),
        queries_path: queries,
        output_path: output,
        top_k,
        quiet,
    };
    let summary = evaluation::run_evaluate(&options)?;
    match summary.average_recall {
        Some(recall) => println!(
            "Evaluated {} queries, average recall@{}: {}",
            summary.queries_run,
            top_k,
            format!("{recall:.4}").bold()
        ),
        None => println!(
            "Evaluated {} queries ({} rows)",
            summary.queries_run, summary.rows_written
        ),
    }
    println!("Report written to {}", summary.output_path.display());
    Ok(())
}

fn run_embedders_command(config: &Config) -> Result<()> {
    let registry = EmbedderRegistry::new(&config.data_dir);
    for embedder in registry.all() {
        let status = if embedder.is_available(&config.data_dir) {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!(
            "{:<10} {:<12} dim={:<5} {}  {}",
            embedder.name, embedder.id, embedder.dimension, status, embedder.description
        );
        let missing = embedder.missing_files(&config.data_dir);
        if !missing.is_empty() {
            println!("           missing: {}", missing.join(", "));
        }
    }
    Ok(())
}

/// Initialize structured logging from `RUST_LOG` (default: warnings only).
pub fn init_tracing() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
        .context("init logging")
}
