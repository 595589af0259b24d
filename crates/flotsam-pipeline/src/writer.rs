//! The batch writer: the sole producer of event rows in the store.

use std::time::Duration;

use flotsam_core::{event::NewEvent, stats::BatchStats, store::EventStore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::buffer::EventReceiver;

#[derive(Debug, Clone)]
pub struct WriterConfig {
  /// Flush as soon as this many events are pending.
  pub batch_size:      usize,
  /// Flush a partial batch this long after its first event arrived.
  pub batch_interval:  Duration,
  /// Store errors tolerated per batch before the batch is dropped.
  pub max_retries:     u32,
  pub initial_backoff: Duration,
  pub max_backoff:     Duration,
}

impl Default for WriterConfig {
  fn default() -> Self {
    WriterConfig {
      batch_size:      500,
      batch_interval:  Duration::from_secs(10),
      max_retries:     5,
      initial_backoff: Duration::from_millis(100),
      max_backoff:     Duration::from_secs(30),
    }
  }
}

/// Counters for one writer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
  pub batches_written: u64,
  pub records_written: u64,
  /// Records abandoned after exhausting retries.
  pub records_failed:  u64,
}

pub struct BatchWriter<S> {
  store:  S,
  config: WriterConfig,
  stats:  WriterStats,
}

impl<S: EventStore> BatchWriter<S> {
  pub fn new(store: S, config: WriterConfig) -> Self {
    BatchWriter { store, config, stats: WriterStats::default() }
  }

  /// Consume the buffer until every producer handle is dropped, flushing
  /// on size or age, then flush the remainder and return the counters.
  pub async fn run(mut self, mut receiver: EventReceiver) -> WriterStats {
    let mut pending: Vec<NewEvent> = Vec::with_capacity(self.config.batch_size);
    // Set when the first event of a partial batch arrives.
    let mut deadline: Option<Instant> = None;

    loop {
      let next = match deadline {
        Some(at) => match tokio::time::timeout_at(at, receiver.recv()).await {
          Ok(event) => event,
          Err(_elapsed) => {
            self.flush(&mut pending).await;
            deadline = None;
            continue;
          }
        },
        None => receiver.recv().await,
      };

      match next {
        Some(event) => {
          if pending.is_empty() {
            deadline = Some(Instant::now() + self.config.batch_interval);
          }
          pending.push(event);
          if pending.len() >= self.config.batch_size {
            self.flush(&mut pending).await;
            deadline = None;
          }
        }
        None => {
          self.flush(&mut pending).await;
          debug!(
            batches = self.stats.batches_written,
            records = self.stats.records_written,
            failed = self.stats.records_failed,
            "batch writer finished"
          );
          return self.stats;
        }
      }
    }
  }

  /// Write one batch with exponential backoff. A batch that still fails
  /// after `max_retries` is logged and dropped so the writer keeps
  /// draining the buffer; delivery is at-least-once up to this boundary.
  async fn flush(&mut self, pending: &mut Vec<NewEvent>) {
    if pending.is_empty() {
      return;
    }
    let records = std::mem::take(pending);
    let stats = BatchStats::from_records(&records);
    let mut backoff = self.config.initial_backoff;

    for attempt in 0..=self.config.max_retries {
      match self.store.write_batch(records.clone(), stats.clone()).await {
        Ok(written) => {
          self.stats.batches_written += 1;
          self.stats.records_written += written;
          debug!(written, attempt, "flushed batch");
          return;
        }
        Err(err) if attempt < self.config.max_retries => {
          warn!(%err, attempt, backoff_ms = backoff.as_millis() as u64, "batch write failed, retrying");
          tokio::time::sleep(backoff).await;
          backoff = (backoff * 2).min(self.config.max_backoff);
        }
        Err(err) => {
          warn!(%err, records = records.len(), "batch write failed after retries, dropping batch");
          self.stats.records_failed += records.len() as u64;
          return;
        }
      }
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
