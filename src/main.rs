mod error;
mod feed;
mod model;
mod normalize;
mod pipeline;
mod progress;
mod registry;
mod settings;
mod source;

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::error::FeedError;
use crate::feed::writer::FeedWriter;
use crate::feed::FeedAssembler;
use crate::model::ProductRecord;
use crate::pipeline::{flush_on_error, Pacing, Pipeline};
use crate::progress::ProgressStore;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::source::fetch::Fetcher;
use crate::source::{HtmlSource, RetryPolicy};

#[derive(Parser)]
#[command(name = "paomma_feed", about = "paomma.ru product scraper and YML feed generator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Scrape new products, then regenerate the feed (default)
    Run,
    /// Regenerate the feed from the progress file without fetching
    Feed,
    /// Show stored products per collection
    Stats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let registry = Registry::load(settings.registry_file.as_deref())?;
    let store = ProgressStore::new(settings.progress_path());

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&settings, &registry, &store).await,
        Commands::Feed => {
            let records = store.load();
            write_feed(&settings, &registry, &records).map_err(Into::into)
        }
        Commands::Stats => {
            print_stats(&registry, &store.load());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, registry: &Registry, store: &ProgressStore) -> Result<()> {
    info!("Starting paomma.ru scraper, progress in {}", store.path().display());
    let mut records = store.load();

    let fetcher = flush_on_error(
        store,
        &records,
        Fetcher::from_settings(settings.spider_api_key.as_deref(), settings.request_timeout()),
    )
    .context("Page source setup failed")?;
    let retry = RetryPolicy {
        attempts: settings.max_retries,
        backoff: settings.retry_backoff(),
    };
    let source = HtmlSource::new(fetcher, registry, retry);
    let pacing = Pacing::new(settings.pace_min_ms, settings.pace_max_ms);
    let pipeline = Pipeline::new(source, registry, store, pacing);

    match pipeline.collect_until(&mut records, tokio::signal::ctrl_c()).await {
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(e.context("Collection failed")),
        None => return Ok(()),
    }

    // A rejected feed leaves the previous file in place; the run still succeeds.
    if let Err(e) = write_feed(settings, registry, &records) {
        error!("Feed not written: {}", e);
    }
    info!("Total products: {}", records.len());
    Ok(())
}

fn write_feed(settings: &Settings, registry: &Registry, records: &[ProductRecord]) -> Result<(), FeedError> {
    let unique = progress::prepare(records);
    let doc = FeedAssembler::new(registry).assemble(&unique, Local::now())?;
    let writer = FeedWriter::new(settings.feed_path(), registry.shop.name.as_str());
    info!("Writing feed to {}", writer.path().display());
    let written = writer.write(&doc.xml)?;
    if let Some(backup) = &written.backup {
        info!("Previous feed kept at {}", backup.display());
    }
    info!(
        "Feed {} written: {} offers, {} skipped",
        written.path.display(),
        doc.offers,
        doc.skipped.len()
    );
    Ok(())
}

fn print_stats(registry: &Registry, records: &[ProductRecord]) {
    println!("{:<28} {:>6}", "Collection", "Count");
    println!("{}", "-".repeat(35));
    for c in &registry.collections {
        let count = records
            .iter()
            .filter(|r| r.collection() == Some(c.key.as_str()))
            .count();
        println!("{:<28} {:>6}", truncate(&c.name, 28), count);
    }
    let unassigned = records
        .iter()
        .filter(|r| r.collection().and_then(|k| registry.collection(k)).is_none())
        .count();
    if unassigned > 0 {
        println!("{:<28} {:>6}", "(none)", unassigned);
    }
    println!("{}", "-".repeat(35));
    println!("{:<28} {:>6}", "Total", records.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
