//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (microsecond precision, `Z` suffix) so that lexicographic range scans
//! and `substr(observed_at, 1, 7)` month grouping are chronological.
//! `per_source_totals` is stored as a compact JSON object.

use chrono::{DateTime, Utc};
use flotsam_core::{
  event::EventRecord,
  stats::CumulativeStats,
  store::ArchiveEntry,
  window::WindowKind,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── WindowKind ──────────────────────────────────────────────────────────────

pub fn encode_kind(kind: WindowKind) -> &'static str { kind.as_str() }

// ─── Error plumbing ──────────────────────────────────────────────────────────

/// Carry a non-SQL error across the `tokio_rusqlite` connection thread.
pub fn boxed(e: impl std::error::Error + Send + Sync + 'static) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub id:            i64,
  pub source_id:     String,
  pub observed_at:   String,
  pub subject_token: String,
  pub content_text:  String,
}

impl RawEvent {
  pub fn into_record(self) -> Result<EventRecord> {
    Ok(EventRecord {
      id:            self.id,
      source_id:     self.source_id,
      observed_at:   decode_dt(&self.observed_at)?,
      subject_token: self.subject_token,
      content_text:  self.content_text,
    })
  }
}

/// Raw strings read directly from an `archive_entries` row.
pub struct RawArchiveEntry {
  pub window_id:       String,
  pub file_path:       String,
  pub record_count:    u64,
  pub file_size_bytes: u64,
  pub archived_at:     String,
  pub deleted:         bool,
}

impl RawArchiveEntry {
  pub fn into_entry(self) -> Result<ArchiveEntry> {
    Ok(ArchiveEntry {
      window_id:       self.window_id,
      file_path:       self.file_path.into(),
      record_count:    self.record_count,
      file_size_bytes: self.file_size_bytes,
      archived_at:     decode_dt(&self.archived_at)?,
      deleted:         self.deleted,
    })
  }
}

/// Raw strings read directly from the `cumulative_stats` row.
pub struct RawCumulative {
  pub total_records:               u64,
  pub total_distinct_subjects:     u64,
  pub total_distinct_content:      u64,
  pub total_subject_content_pairs: u64,
  pub first_seen:                  Option<String>,
  pub last_seen:                   Option<String>,
  pub per_source_totals:           String,
}

impl RawCumulative {
  pub fn into_stats(self) -> Result<CumulativeStats> {
    Ok(CumulativeStats {
      total_records:               self.total_records,
      total_distinct_subjects:     self.total_distinct_subjects,
      total_distinct_content:      self.total_distinct_content,
      total_subject_content_pairs: self.total_subject_content_pairs,
      first_seen:                  self.first_seen.as_deref().map(decode_dt).transpose()?,
      last_seen:                   self.last_seen.as_deref().map(decode_dt).transpose()?,
      per_source_totals:           serde_json::from_str(&self.per_source_totals)?,
    })
  }
}
