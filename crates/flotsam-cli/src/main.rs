//! `flotsam` — ingestion and maintenance commands for the search-event
//! store.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite live store, and runs one subcommand to completion:
//!
//! ```
//! collaborator | flotsam ingest
//! flotsam archive
//! flotsam refresh-periods
//! flotsam stats
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use flotsam_core::{
  anonymize::Anonymizer,
  config::PipelineConfig,
  event::RawSearch,
  store::EventStore,
};
use flotsam_jobs::{
  ArchiveConfig, ArchiveEngine, PeriodAggregator, PeriodConfig, RunSummary, WindowOutcome,
  rebuild_cumulative,
};
use flotsam_pipeline::{Backpressure, BatchWriter, WriterConfig, channel};
use flotsam_store_sqlite::SqliteStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flotsam", version, about = "Search-event ingestion and archival pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Read JSON-lines search events from stdin and persist them.
  Ingest,
  /// Export stale months to parquet, optionally purging live rows.
  Archive,
  /// Recompute weekly and monthly aggregates over the live data.
  RefreshPeriods,
  /// Rebuild the cumulative totals row from archives plus live rows.
  RebuildStats,
  /// Print the cumulative totals as JSON.
  Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("FLOTSAM"))
    .build()
    .context("failed to read config file")?;
  let pipeline_cfg: PipelineConfig = settings
    .try_deserialize()
    .context("failed to deserialise PipelineConfig")?;
  pipeline_cfg.validate().context("invalid configuration")?;

  let store_path = expand_tilde(&pipeline_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Ingest => ingest(&pipeline_cfg, store).await,
    Command::Archive => {
      let engine = ArchiveEngine::new(store, ArchiveConfig {
        archive_dir:        expand_tilde(&pipeline_cfg.archive_dir),
        staleness_margin:   chrono::Duration::days(pipeline_cfg.staleness_margin_days),
        purge_after_export: pipeline_cfg.purge_after_export,
      });
      report("archival", engine.run_once().await?)
    }
    Command::RefreshPeriods => {
      let aggregator = PeriodAggregator::new(store, PeriodConfig {
        min_distinct_subjects: pipeline_cfg.min_distinct_subjects,
        max_length_bucket:     pipeline_cfg.max_length_bucket,
      });
      report("period refresh", aggregator.run_once().await?)
    }
    Command::RebuildStats => {
      let stats = rebuild_cumulative(&store).await?;
      println!("{}", serde_json::to_string_pretty(&stats)?);
      Ok(())
    }
    Command::Stats => {
      match store.cumulative().await? {
        Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
        None => println!("no data ingested yet"),
      }
      Ok(())
    }
  }
}

/// Pump stdin through the anonymizer and the bounded buffer while the
/// batch writer drains it. Returns once stdin closes and the final batch
/// is flushed.
async fn ingest(cfg: &PipelineConfig, store: SqliteStore) -> anyhow::Result<()> {
  let anonymizer = Anonymizer::new(&cfg.anonymize_key)?;

  let policy = if cfg.submit_timeout_ms == 0 {
    Backpressure::Reject
  } else {
    Backpressure::Block { timeout: Duration::from_millis(cfg.submit_timeout_ms) }
  };
  let (buffer, receiver) = channel(cfg.buffer_capacity, policy);
  let writer = BatchWriter::new(store, WriterConfig {
    batch_size: cfg.batch_size,
    batch_interval: Duration::from_secs(cfg.batch_interval_secs),
    max_retries: cfg.max_flush_retries,
    ..WriterConfig::default()
  });
  let writer_task = tokio::spawn(writer.run(receiver));

  let mut submitted = 0u64;
  let mut malformed = 0u64;
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    let line = tokio::select! {
      line = lines.next_line() => line.context("reading stdin")?,
      _ = tokio::signal::ctrl_c() => {
        info!("interrupted, flushing pending records");
        break;
      }
    };
    let Some(line) = line else { break };
    if line.trim().is_empty() {
      continue;
    }
    let raw: RawSearch = match serde_json::from_str(&line) {
      Ok(raw) => raw,
      Err(err) => {
        malformed += 1;
        warn!(%err, "skipping malformed input line");
        continue;
      }
    };
    match buffer.submit(anonymizer.event(raw)).await {
      Ok(()) => submitted += 1,
      // Overflow is already counted by the buffer; keep reading.
      Err(flotsam_pipeline::Error::CapacityExceeded) => {}
      Err(err) => anyhow::bail!("ingestion stopped early: {err}"),
    }
  }

  // Closing the producer side lets the writer flush and return.
  let dropped = buffer.dropped();
  drop(buffer);
  let stats = writer_task.await.context("batch writer panicked")?;

  info!(
    submitted,
    malformed,
    dropped,
    batches = stats.batches_written,
    written = stats.records_written,
    failed = stats.records_failed,
    "ingestion finished"
  );
  Ok(())
}

/// Log a job summary and fail the process if any window failed, so cron
/// and friends notice.
fn report(job: &str, summary: RunSummary) -> anyhow::Result<()> {
  for (window, outcome) in &summary.outcomes {
    if let WindowOutcome::Failed(reason) = outcome {
      warn!(%window, %reason, "window failed");
    }
  }
  info!(job, %summary, "run complete");
  if summary.failed() > 0 {
    anyhow::bail!("{job}: {} of {} windows failed", summary.failed(), summary.total());
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
