//! Cumulative all-time totals and per-batch accounting.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{event::NewEvent, text};

// ─── CumulativeStats ─────────────────────────────────────────────────────────

/// The single all-time totals row.
///
/// Counters are monotonically non-decreasing regardless of archival
/// deletions — this row is the only place historical magnitude survives
/// physical deletion of raw rows. Distinct counts are sums of per-batch
/// distinct counts, with no cross-batch deduplication; that approximation
/// is the accepted tradeoff for not retaining raw data forever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeStats {
  pub total_records:               u64,
  pub total_distinct_subjects:     u64,
  pub total_distinct_content:      u64,
  pub total_subject_content_pairs: u64,
  pub first_seen:                  Option<DateTime<Utc>>,
  pub last_seen:                   Option<DateTime<Utc>>,
  pub per_source_totals:           BTreeMap<String, u64>,
}

impl CumulativeStats {
  /// Fold one batch into the totals. Counters only increase and the
  /// `[first_seen, last_seen]` range only widens; nothing here can make
  /// the row regress.
  pub fn absorb(&mut self, batch: &BatchStats) {
    self.total_records += batch.records;
    self.total_distinct_subjects += batch.distinct_subjects;
    self.total_distinct_content += batch.distinct_content;
    self.total_subject_content_pairs += batch.subject_content_pairs;

    self.first_seen = match (self.first_seen, batch.first) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    };
    self.last_seen = match (self.last_seen, batch.last) {
      (Some(a), Some(b)) => Some(a.max(b)),
      (a, b) => a.or(b),
    };

    for (source, count) in &batch.per_source {
      *self.per_source_totals.entry(source.clone()).or_insert(0) += count;
    }
  }
}

// ─── BatchStats ──────────────────────────────────────────────────────────────

/// Counts computed over one batch before it is written, so the store can
/// fold them into [`CumulativeStats`] in the same transaction as the
/// insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
  pub records:               u64,
  pub distinct_subjects:     u64,
  pub distinct_content:      u64,
  pub subject_content_pairs: u64,
  pub first:                 Option<DateTime<Utc>>,
  pub last:                  Option<DateTime<Utc>>,
  pub per_source:            BTreeMap<String, u64>,
}

impl BatchStats {
  pub fn from_records(records: &[NewEvent]) -> Self {
    let mut subjects: HashSet<&str> = HashSet::new();
    let mut contents: HashSet<String> = HashSet::new();
    let mut pairs: HashSet<(&str, String)> = HashSet::new();
    let mut stats = BatchStats { records: records.len() as u64, ..BatchStats::default() };

    for record in records {
      let normalized = text::normalize(&record.content_text);
      subjects.insert(record.subject_token.as_str());
      pairs.insert((record.subject_token.as_str(), normalized.clone()));
      contents.insert(normalized);

      *stats.per_source.entry(record.source_id.clone()).or_insert(0) += 1;
      stats.first = Some(match stats.first {
        Some(f) => f.min(record.observed_at),
        None => record.observed_at,
      });
      stats.last = Some(match stats.last {
        Some(l) => l.max(record.observed_at),
        None => record.observed_at,
      });
    }

    stats.distinct_subjects = subjects.len() as u64;
    stats.distinct_content = contents.len() as u64;
    stats.subject_content_pairs = pairs.len() as u64;
    stats
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn event(source: &str, subject: &str, content: &str, ts: &str) -> NewEvent {
    NewEvent {
      source_id:     source.into(),
      observed_at:   DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
      subject_token: subject.into(),
      content_text:  content.into(),
    }
  }

  #[test]
  fn batch_stats_count_distincts() {
    let records = vec![
      event("probe-a", "s1", "Alpha Beta", "2026-01-01T00:00:00Z"),
      event("probe-a", "s1", "alpha beta ", "2026-01-02T00:00:00Z"),
      event("probe-b", "s2", "gamma", "2026-01-03T00:00:00Z"),
    ];
    let stats = BatchStats::from_records(&records);

    assert_eq!(stats.records, 3);
    assert_eq!(stats.distinct_subjects, 2);
    // "Alpha Beta" and "alpha beta " normalize to the same content.
    assert_eq!(stats.distinct_content, 2);
    assert_eq!(stats.subject_content_pairs, 2);
    assert_eq!(stats.per_source.get("probe-a"), Some(&2));
    assert_eq!(stats.per_source.get("probe-b"), Some(&1));
    assert_eq!(stats.first.unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    assert_eq!(stats.last.unwrap().to_rfc3339(), "2026-01-03T00:00:00+00:00");
  }

  #[test]
  fn empty_batch_is_all_zeroes() {
    let stats = BatchStats::from_records(&[]);
    assert_eq!(stats, BatchStats::default());
  }

  #[test]
  fn absorb_is_monotone() {
    let mut cumulative = CumulativeStats::default();
    let first = BatchStats::from_records(&[
      event("probe-a", "s1", "alpha", "2026-01-05T00:00:00Z"),
      event("probe-a", "s2", "beta", "2026-01-06T00:00:00Z"),
    ]);
    let second = BatchStats::from_records(&[
      event("probe-b", "s1", "alpha", "2026-01-01T00:00:00Z"),
    ]);

    cumulative.absorb(&first);
    let snapshot = cumulative.clone();
    cumulative.absorb(&second);

    assert!(cumulative.total_records >= snapshot.total_records);
    assert!(cumulative.total_distinct_subjects >= snapshot.total_distinct_subjects);
    assert_eq!(cumulative.total_records, 3);
    // s1 appears in both batches: per-batch sums do not deduplicate.
    assert_eq!(cumulative.total_distinct_subjects, 3);
    // The earlier second batch widens first_seen backwards.
    assert_eq!(cumulative.first_seen.unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
    assert_eq!(cumulative.last_seen.unwrap().to_rfc3339(), "2026-01-06T00:00:00+00:00");
  }

  #[test]
  fn absorb_merges_source_totals() {
    let mut cumulative = CumulativeStats::default();
    cumulative.absorb(&BatchStats::from_records(&[
      event("probe-a", "s1", "alpha", "2026-01-01T00:00:00Z"),
    ]));
    cumulative.absorb(&BatchStats::from_records(&[
      event("probe-a", "s2", "beta", "2026-01-02T00:00:00Z"),
      event("probe-b", "s3", "gamma", "2026-01-02T00:00:00Z"),
    ]));

    assert_eq!(cumulative.per_source_totals.get("probe-a"), Some(&2));
    assert_eq!(cumulative.per_source_totals.get("probe-b"), Some(&1));
  }
}
