//! Pure aggregation math for per-window statistics.
//!
//! The store supplies per-content counts for a window; the functions here
//! apply the k-anonymity floor, ranking, and length bucketing. Keeping
//! this free of SQL makes the ordering rules directly testable.

use std::collections::BTreeMap;

use crate::{
  text,
  window::{Window, WindowKind},
};

// ─── Row types ───────────────────────────────────────────────────────────────

/// Counts for one distinct normalized content within one window, as read
/// from the live store. No threshold is applied at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStat {
  pub normalized_content: String,
  pub distinct_subjects:  u64,
  pub total_occurrences:  u64,
}

/// One ranked item for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTopEntry {
  pub window_kind:        WindowKind,
  pub window_id:          String,
  pub normalized_content: String,
  pub distinct_subjects:  u64,
  pub total_occurrences:  u64,
  pub rank:               u32,
}

/// One histogram bucket for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLengthEntry {
  pub window_kind:            WindowKind,
  pub window_id:              String,
  pub length_bucket:          u32,
  pub distinct_content_count: u64,
}

// ─── Computation ─────────────────────────────────────────────────────────────

/// Rank the contents meeting the k-anonymity floor.
///
/// Ordering is `(distinct_subjects desc, total_occurrences desc,
/// normalized_content asc)`; the final text tiebreak makes re-runs
/// byte-stable. Rank is dense, starting at 1. An empty result is a valid
/// outcome for a quiet window.
pub fn rank_top(
  window: &Window,
  stats: &[ContentStat],
  min_distinct_subjects: u64,
) -> Vec<PeriodTopEntry> {
  let mut qualifying: Vec<&ContentStat> = stats
    .iter()
    .filter(|s| s.distinct_subjects >= min_distinct_subjects)
    .collect();

  qualifying.sort_by(|a, b| {
    b.distinct_subjects
      .cmp(&a.distinct_subjects)
      .then(b.total_occurrences.cmp(&a.total_occurrences))
      .then(a.normalized_content.cmp(&b.normalized_content))
  });

  qualifying
    .into_iter()
    .enumerate()
    .map(|(i, s)| PeriodTopEntry {
      window_kind:        window.kind,
      window_id:          window.id.clone(),
      normalized_content: s.normalized_content.clone(),
      distinct_subjects:  s.distinct_subjects,
      total_occurrences:  s.total_occurrences,
      rank:               i as u32 + 1,
    })
    .collect()
}

/// Distinct-content counts by word-count bucket, bucket capped at
/// `max_bucket`. Unlike the top list, the histogram covers every distinct
/// content in the window.
pub fn length_histogram(
  window: &Window,
  stats: &[ContentStat],
  max_bucket: u32,
) -> Vec<PeriodLengthEntry> {
  let mut buckets: BTreeMap<u32, u64> = BTreeMap::new();
  for s in stats {
    *buckets.entry(text::length_bucket(&s.normalized_content, max_bucket)).or_insert(0) += 1;
  }
  buckets
    .into_iter()
    .map(|(length_bucket, distinct_content_count)| PeriodLengthEntry {
      window_kind: window.kind,
      window_id: window.id.clone(),
      length_bucket,
      distinct_content_count,
    })
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
