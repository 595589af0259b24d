//! Runtime configuration, deserialized from `config.toml` plus
//! `FLOTSAM_*` environment variables by the binary.

use std::path::PathBuf;

use serde::Deserialize;

use crate::{Error, Result};

fn default_buffer_capacity() -> usize { 100_000 }
fn default_batch_size() -> usize { 500 }
fn default_batch_interval_secs() -> u64 { 10 }
fn default_staleness_margin_days() -> i64 { 7 }
fn default_min_distinct_subjects() -> u64 { 5 }
fn default_max_length_bucket() -> u32 { 100 }
fn default_max_flush_retries() -> u32 { 5 }

/// Everything the pipeline needs, validated once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
  /// SQLite live store file.
  pub store_path: PathBuf,

  /// Directory receiving one Parquet file per archived month.
  pub archive_dir: PathBuf,

  /// Key for the deterministic subject anonymizer. Required; there is no
  /// unobfuscated fallback.
  pub anonymize_key: String,

  /// Ingestion buffer capacity in records.
  #[serde(default = "default_buffer_capacity")]
  pub buffer_capacity: usize,

  /// Flush a batch once it holds this many records.
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,

  /// Flush a batch this long after its first record, even if short.
  #[serde(default = "default_batch_interval_secs")]
  pub batch_interval_secs: u64,

  /// How long `submit` may wait for buffer space. Zero selects the
  /// reject-and-count backpressure policy.
  #[serde(default)]
  pub submit_timeout_ms: u64,

  /// A month qualifies for archival only once its newest record is at
  /// least this old, guarding against late-arriving data.
  #[serde(default = "default_staleness_margin_days")]
  pub staleness_margin_days: i64,

  /// Delete a month's live rows after its archive entry is durable.
  #[serde(default)]
  pub purge_after_export: bool,

  /// k-anonymity floor for the per-window top list.
  #[serde(default = "default_min_distinct_subjects")]
  pub min_distinct_subjects: u64,

  /// Cap on the length-histogram word-count bucket.
  #[serde(default = "default_max_length_bucket")]
  pub max_length_bucket: u32,

  /// Bounded retries for a failed batch write before the batch is
  /// dropped.
  #[serde(default = "default_max_flush_retries")]
  pub max_flush_retries: u32,
}

impl PipelineConfig {
  /// Fail-fast validation; any error here aborts startup before a single
  /// record is accepted.
  pub fn validate(&self) -> Result<()> {
    let fail = |msg: &str| Err(Error::Config(msg.to_owned()));

    if self.anonymize_key.trim().is_empty() {
      return fail("anonymize_key must not be empty");
    }
    if self.buffer_capacity == 0 {
      return fail("buffer_capacity must be at least 1");
    }
    if self.batch_size == 0 {
      return fail("batch_size must be at least 1");
    }
    if self.batch_interval_secs == 0 {
      return fail("batch_interval_secs must be at least 1");
    }
    if self.staleness_margin_days < 0 {
      return fail("staleness_margin_days must not be negative");
    }
    if self.min_distinct_subjects == 0 {
      return fail("min_distinct_subjects must be at least 1");
    }
    if self.max_length_bucket == 0 {
      return fail("max_length_bucket must be at least 1");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> PipelineConfig {
    PipelineConfig {
      store_path:            "flotsam.db".into(),
      archive_dir:           "archives".into(),
      anonymize_key:         "research-key".into(),
      buffer_capacity:       default_buffer_capacity(),
      batch_size:            default_batch_size(),
      batch_interval_secs:   default_batch_interval_secs(),
      submit_timeout_ms:     0,
      staleness_margin_days: default_staleness_margin_days(),
      purge_after_export:    false,
      min_distinct_subjects: default_min_distinct_subjects(),
      max_length_bucket:     default_max_length_bucket(),
      max_flush_retries:     default_max_flush_retries(),
    }
  }

  #[test]
  fn defaults_validate() {
    assert!(config().validate().is_ok());
  }

  #[test]
  fn missing_key_is_fatal() {
    let mut cfg = config();
    cfg.anonymize_key = "  ".into();
    assert!(matches!(cfg.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn zero_thresholds_are_fatal() {
    for mutate in [
      (|c: &mut PipelineConfig| c.buffer_capacity = 0) as fn(&mut PipelineConfig),
      |c| c.batch_size = 0,
      |c| c.batch_interval_secs = 0,
      |c| c.min_distinct_subjects = 0,
      |c| c.max_length_bucket = 0,
    ] {
      let mut cfg = config();
      mutate(&mut cfg);
      assert!(cfg.validate().is_err());
    }
  }
}
