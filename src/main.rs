//! glossfill CLI - fill empty glossary cells via a chat-completion API.

use anyhow::{Context, Result};
use clap::Parser;
use glossfill::{
    discover_tasks, ApiClient, Checkpoint, Config, Direction, Dispatcher, GenerationClient, Table,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "glossfill")]
#[command(version)]
#[command(about = "Fill empty glossary table cells via a chat-completion API")]
struct Cli {
    /// Process cells in natural table order (default)
    #[arg(long, conflicts_with = "bottomup")]
    topdown: bool,

    /// Process cells in reversed table order
    #[arg(long)]
    bottomup: bool,

    /// Use the sample table instead of the full one
    #[arg(long)]
    sample: bool,

    /// Table file to process (overrides config and --sample)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Override the concurrency ceiling
    #[arg(long)]
    workers: Option<usize>,

    /// Override the batch multiplier (batch size = workers × multiplier)
    #[arg(long)]
    batch_multiplier: Option<usize>,

    /// Delete the checkpoint and start over
    #[arg(long)]
    reset_checkpoint: bool,

    /// Path to configuration file (defaults used when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    if let Some(multiplier) = cli.batch_multiplier {
        config.pipeline.batch_multiplier = multiplier;
    }

    // Resolve the credential before touching any file: a misconfigured
    // run must exit without side effects
    let api_key = config.resolve_api_key().context("Failed to resolve API key")?;

    let table_path = match cli.file {
        Some(path) => path,
        None if cli.sample => config.input.sample_table.clone(),
        None => config.input.table.clone(),
    };

    if cli.reset_checkpoint && config.input.checkpoint.exists() {
        std::fs::remove_file(&config.input.checkpoint)
            .with_context(|| format!("Failed to remove {:?}", config.input.checkpoint))?;
        info!("Checkpoint reset");
    }

    // --topdown just spells out the default; clap rejects the pair
    let direction = match (cli.topdown, cli.bottomup) {
        (_, true) => Direction::BottomUp,
        _ => Direction::TopDown,
    };
    info!(table = %table_path.display(), ?direction, "Starting fill pass");

    let mut table =
        Table::load(&table_path).with_context(|| format!("Failed to load table {table_path:?}"))?;
    let mut checkpoint = Checkpoint::load(&config.input.checkpoint)
        .with_context(|| format!("Failed to load checkpoint {:?}", config.input.checkpoint))?;

    let removed = checkpoint.reconcile(&table);
    if removed > 0 {
        checkpoint.save().context("Failed to save reconciled checkpoint")?;
        info!(removed, "Reconciled checkpoint: stale entries re-queued");
    }

    let tasks = discover_tasks(&table, &checkpoint, direction);

    let api = Arc::new(ApiClient::new(
        api_key,
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    )?);
    let generator = Arc::new(GenerationClient::new(Arc::clone(&api), &config.pipeline));
    let dispatcher = Dispatcher::new(
        generator,
        config.pipeline.workers,
        config.pipeline.batch_multiplier,
    );

    let stats = dispatcher.run(&mut table, &mut checkpoint, tasks).await?;

    println!("\n=== Fill Pass Complete ===");
    println!("Cells:       {}", stats.total_tasks);
    println!("Filled:      {}", stats.filled);
    println!("Failed:      {}", stats.failed);
    println!("Batches:     {}", stats.batches);
    println!("Requests:    {}", api.requests_issued());
    println!("Runtime:     {:.1}s", stats.runtime_secs);
    println!("Checkpoint:  {} entries", checkpoint.len());
    println!("Output:      {}", table_path.display());

    Ok(())
}
