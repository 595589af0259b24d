//! The `EventStore` trait and archive metadata type.
//!
//! The trait is implemented by storage backends (e.g.
//! `flotsam-store-sqlite`). The pipeline and job crates depend on this
//! abstraction, not on any concrete backend.
//!
//! Ownership rules enforced by convention across components:
//! - the batch writer is the only producer of event rows;
//! - the archival engine is the only component that deletes event rows,
//!   and only whole windows at a time;
//! - the period aggregator fully owns the rows of any window it has
//!   (re)computed and replaces them wholesale.

use std::{future::Future, path::PathBuf};

use chrono::{DateTime, Utc};

use crate::{
  event::{EventRecord, NewEvent},
  period::{ContentStat, PeriodLengthEntry, PeriodTopEntry},
  stats::{BatchStats, CumulativeStats},
  window::{Window, WindowKind},
};

// ─── Archive metadata ────────────────────────────────────────────────────────

/// Metadata for one exported month. At most one non-superseded entry per
/// `window_id`; `deleted` is a one-way transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
  pub window_id:       String,
  pub file_path:       PathBuf,
  pub record_count:    u64,
  pub file_size_bytes: u64,
  pub archived_at:     DateTime<Utc>,
  pub deleted:         bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the live store backend.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait EventStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Insert a batch of events and fold `stats` into the cumulative row in
  /// the same transaction, so a crash cannot undercount. Returns the
  /// number of rows written.
  fn write_batch(
    &self,
    records: Vec<NewEvent>,
    stats: BatchStats,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Cumulative stats ──────────────────────────────────────────────────

  /// The all-time totals row, if any batch has ever been written.
  fn cumulative(
    &self,
  ) -> impl Future<Output = Result<Option<CumulativeStats>, Self::Error>> + Send + '_;

  /// Overwrite the totals row. Reserved for the rebuild recovery path —
  /// the only operation allowed to lower counters.
  fn put_cumulative(
    &self,
    stats: CumulativeStats,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Range queries ─────────────────────────────────────────────────────

  /// `(min, max)` of `observed_at` over live rows; `None` when empty.
  fn observed_range(
    &self,
  ) -> impl Future<Output = Result<Option<(DateTime<Utc>, DateTime<Utc>)>, Self::Error>>
  + Send
  + '_;

  /// Month ids whose newest record is older than `cutoff`, excluding
  /// months already archived and purged. Ordered ascending.
  fn stale_months(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// All rows in the window's time range, ordered by time then id.
  fn window_events<'a>(
    &'a self,
    window: &'a Window,
  ) -> impl Future<Output = Result<Vec<EventRecord>, Self::Error>> + Send + 'a;

  fn window_event_count<'a>(
    &'a self,
    window: &'a Window,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Delete exactly the window's key range in one transaction, leaving
  /// concurrent writes outside the range untouched. Returns rows removed.
  fn delete_window_events<'a>(
    &'a self,
    window: &'a Window,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Archive metadata ──────────────────────────────────────────────────

  fn archive_entry<'a>(
    &'a self,
    window_id: &'a str,
  ) -> impl Future<Output = Result<Option<ArchiveEntry>, Self::Error>> + Send + 'a;

  fn list_archive_entries(
    &self,
  ) -> impl Future<Output = Result<Vec<ArchiveEntry>, Self::Error>> + Send + '_;

  /// Upsert the entry for its window. A conflicting upsert refreshes the
  /// file metadata but never clears an existing `deleted` flag.
  fn record_archive(
    &self,
    entry: ArchiveEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Flip `deleted` to true. One-way; there is no inverse operation.
  fn mark_archive_purged<'a>(
    &'a self,
    window_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Period aggregates ─────────────────────────────────────────────────

  /// Per-content counts for the window, grouped on normalized content.
  /// No threshold applied; the caller owns filtering and ranking.
  fn content_stats<'a>(
    &'a self,
    window: &'a Window,
  ) -> impl Future<Output = Result<Vec<ContentStat>, Self::Error>> + Send + 'a;

  /// Replace the window's aggregate rows in one transaction
  /// (delete-then-insert), so concurrent readers never observe a
  /// partially refreshed window.
  fn replace_period_rows(
    &self,
    kind: WindowKind,
    window_id: String,
    top: Vec<PeriodTopEntry>,
    length: Vec<PeriodLengthEntry>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Ranked rows for a window, ordered by rank.
  fn period_top<'a>(
    &'a self,
    kind: WindowKind,
    window_id: &'a str,
  ) -> impl Future<Output = Result<Vec<PeriodTopEntry>, Self::Error>> + Send + 'a;

  /// Histogram rows for a window, ordered by bucket.
  fn period_length<'a>(
    &'a self,
    kind: WindowKind,
    window_id: &'a str,
  ) -> impl Future<Output = Result<Vec<PeriodLengthEntry>, Self::Error>> + Send + 'a;
}
