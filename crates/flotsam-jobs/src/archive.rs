//! Monthly archival: export stale months to parquet, verify, and
//! optionally purge the live rows.
//!
//! Each month moves through live → exported → purged. The transition to
//! exported is only durable once the archive entry is recorded, and rows
//! are only deleted against a recorded, verified entry. Every step is
//! idempotent so a crashed run can simply be repeated.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use flotsam_core::{
  event::NewEvent,
  store::{ArchiveEntry, EventStore},
  window::Window,
};
use tracing::{info, warn};

use crate::{
  Error, Result, format,
  summary::{RunSummary, WindowOutcome},
};

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
  pub archive_dir:        PathBuf,
  /// A month is stale once its newest record is older than this.
  pub staleness_margin:   Duration,
  /// When false, months are exported but their live rows are kept.
  pub purge_after_export: bool,
}

pub struct ArchiveEngine<S> {
  store:  S,
  config: ArchiveConfig,
}

impl<S: EventStore> ArchiveEngine<S> {
  pub fn new(store: S, config: ArchiveConfig) -> Self {
    ArchiveEngine { store, config }
  }

  /// Archive every stale month. Months are handled independently; one
  /// failure is recorded in the summary and the run moves on.
  pub async fn run_once(&self) -> Result<RunSummary> {
    std::fs::create_dir_all(&self.config.archive_dir)?;
    let cutoff = Utc::now() - self.config.staleness_margin;
    let months = self.store.stale_months(cutoff).await.map_err(Error::store)?;

    let mut summary = RunSummary::default();
    for month in months {
      match self.archive_month(&month).await {
        Ok(outcome) => summary.push(month, outcome),
        Err(err) => {
          warn!(%err, %month, "archival failed for month");
          summary.push(month, WindowOutcome::Failed(err.to_string()));
        }
      }
    }
    Ok(summary)
  }

  async fn archive_month(&self, month: &str) -> Result<WindowOutcome> {
    let window = Window::from_month_id(month)?;
    let existing = self.store.archive_entry(month).await.map_err(Error::store)?;

    if let Some(entry) = existing {
      if entry.deleted {
        return Ok(WindowOutcome::Skipped("already archived and purged".into()));
      }
      // A previous run exported but did not purge. Reuse the file if it
      // still matches the live rows; otherwise fall through and re-export.
      let live = self.store.window_event_count(&window).await.map_err(Error::store)?;
      if entry.file_path.is_file() && format::archive_row_count(&entry.file_path)? == live {
        if self.config.purge_after_export {
          self.purge(&window, &entry.window_id).await?;
          return Ok(WindowOutcome::Completed);
        }
        return Ok(WindowOutcome::Skipped("already exported".into()));
      }
    }

    let records: Vec<NewEvent> = self
      .store
      .window_events(&window)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(NewEvent::from)
      .collect();
    let path = format::archive_file_path(&self.config.archive_dir, month);
    format::write_archive(&path, &records)?;

    // Trust the file only if its footer agrees with the store.
    let actual = format::archive_row_count(&path)?;
    let expected = self.store.window_event_count(&window).await.map_err(Error::store)?;
    if actual != expected {
      std::fs::remove_file(&path)?;
      return Err(Error::Integrity { window_id: month.to_owned(), expected, actual });
    }

    let file_size_bytes = std::fs::metadata(&path)?.len();
    self
      .store
      .record_archive(ArchiveEntry {
        window_id: month.to_owned(),
        file_path: path,
        record_count: actual,
        file_size_bytes,
        archived_at: Utc::now(),
        deleted: false,
      })
      .await
      .map_err(Error::store)?;
    info!(month, records = actual, "exported month");

    if self.config.purge_after_export {
      self.purge(&window, month).await?;
    }
    Ok(WindowOutcome::Completed)
  }

  /// Delete the month's live rows and mark the entry purged. Reached only
  /// with a verified archive entry on record. Cumulative stats are left
  /// untouched; they already account for these rows.
  async fn purge(&self, window: &Window, month: &str) -> Result<()> {
    let removed = self.store.delete_window_events(window).await.map_err(Error::store)?;
    self.store.mark_archive_purged(month).await.map_err(Error::store)?;
    info!(month, removed, "purged live rows for archived month");
    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::DateTime;
  use flotsam_core::{
    event::EventRecord,
    period::{ContentStat, PeriodLengthEntry, PeriodTopEntry},
    stats::{BatchStats, CumulativeStats},
    window::WindowKind,
  };
  use flotsam_store_sqlite::SqliteStore;

  use super::*;

  async fn store() -> SqliteStore {
    SqliteStore::open_in_memory().await.expect("in-memory store")
  }

  fn event(subject: &str, content: &str, at: &str) -> NewEvent {
    NewEvent {
      source_id:     "probe-a".into(),
      observed_at:   DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
      subject_token: subject.into(),
      content_text:  content.into(),
    }
  }

  async fn seed(store: &SqliteStore, records: Vec<NewEvent>) {
    let stats = BatchStats::from_records(&records);
    store.write_batch(records, stats).await.unwrap();
  }

  fn engine(store: SqliteStore, dir: &std::path::Path, purge: bool) -> ArchiveEngine<SqliteStore> {
    ArchiveEngine::new(store, ArchiveConfig {
      archive_dir:        dir.to_path_buf(),
      staleness_margin:   Duration::days(7),
      purge_after_export: purge,
    })
  }

  // Months far in the past are stale under any realistic clock.
  fn old_month_events() -> Vec<NewEvent> {
    vec![
      event("s1", "alpha", "2020-01-05T10:00:00Z"),
      event("s2", "beta", "2020-01-15T10:00:00Z"),
      event("s3", "gamma", "2020-01-25T10:00:00Z"),
    ]
  }

  #[tokio::test]
  async fn exports_stale_months_and_records_entries() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;

    let summary = engine(s.clone(), dir.path(), false).run_once().await.unwrap();
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.total(), 1);

    let entry = s.archive_entry("2020-01").await.unwrap().expect("entry recorded");
    assert_eq!(entry.record_count, 3);
    assert!(!entry.deleted);
    assert!(entry.file_path.is_file());
    assert_eq!(format::read_archive(&entry.file_path).unwrap().len(), 3);

    // Without purge the live rows stay.
    let window = Window::from_month_id("2020-01").unwrap();
    assert_eq!(s.window_event_count(&window).await.unwrap(), 3);
  }

  #[tokio::test]
  async fn rerun_without_purge_is_a_skip() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;

    let engine = engine(s, dir.path(), false);
    engine.run_once().await.unwrap();
    let summary = engine.run_once().await.unwrap();

    assert_eq!(summary.completed(), 0);
    assert_eq!(summary.skipped(), 1);
  }

  #[tokio::test]
  async fn purge_deletes_rows_but_not_cumulative() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;
    let before = s.cumulative().await.unwrap().unwrap();

    let summary = engine(s.clone(), dir.path(), true).run_once().await.unwrap();
    assert_eq!(summary.completed(), 1);

    let window = Window::from_month_id("2020-01").unwrap();
    assert_eq!(s.window_event_count(&window).await.unwrap(), 0);
    assert!(s.archive_entry("2020-01").await.unwrap().unwrap().deleted);
    assert_eq!(s.cumulative().await.unwrap().unwrap(), before);
  }

  #[tokio::test]
  async fn rerun_after_purge_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;

    let engine = engine(s, dir.path(), true);
    engine.run_once().await.unwrap();
    let summary = engine.run_once().await.unwrap();

    // Purged months no longer appear as stale candidates at all.
    assert_eq!(summary.total(), 0);
  }

  #[tokio::test]
  async fn purge_pass_picks_up_a_prior_export() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;

    // First pass export-only, second pass with purge enabled.
    engine(s.clone(), dir.path(), false).run_once().await.unwrap();
    let summary = engine(s.clone(), dir.path(), true).run_once().await.unwrap();
    assert_eq!(summary.completed(), 1);

    let entry = s.archive_entry("2020-01").await.unwrap().unwrap();
    assert!(entry.deleted);
    let window = Window::from_month_id("2020-01").unwrap();
    assert_eq!(s.window_event_count(&window).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn missing_file_triggers_reexport() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, old_month_events()).await;

    let engine = engine(s.clone(), dir.path(), false);
    engine.run_once().await.unwrap();
    let entry = s.archive_entry("2020-01").await.unwrap().unwrap();
    std::fs::remove_file(&entry.file_path).unwrap();

    let summary = engine.run_once().await.unwrap();
    assert_eq!(summary.completed(), 1);
    assert!(entry.file_path.is_file());
  }

  /// Delegates to a real store but inflates the live count for one
  /// month, so that month's export can never verify.
  #[derive(Clone)]
  struct MiscountingStore {
    inner:     SqliteStore,
    bad_month: String,
  }

  impl EventStore for MiscountingStore {
    type Error = flotsam_store_sqlite::Error;

    async fn window_event_count(&self, window: &Window) -> Result<u64, Self::Error> {
      let count = self.inner.window_event_count(window).await?;
      Ok(if window.id == self.bad_month { count + 1 } else { count })
    }

    async fn stale_months(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, Self::Error> {
      self.inner.stale_months(cutoff).await
    }
    async fn window_events(&self, window: &Window) -> Result<Vec<EventRecord>, Self::Error> {
      self.inner.window_events(window).await
    }
    async fn delete_window_events(&self, window: &Window) -> Result<u64, Self::Error> {
      self.inner.delete_window_events(window).await
    }
    async fn archive_entry(&self, id: &str) -> Result<Option<ArchiveEntry>, Self::Error> {
      self.inner.archive_entry(id).await
    }
    async fn list_archive_entries(&self) -> Result<Vec<ArchiveEntry>, Self::Error> {
      self.inner.list_archive_entries().await
    }
    async fn record_archive(&self, entry: ArchiveEntry) -> Result<(), Self::Error> {
      self.inner.record_archive(entry).await
    }
    async fn mark_archive_purged(&self, id: &str) -> Result<(), Self::Error> {
      self.inner.mark_archive_purged(id).await
    }

    async fn write_batch(
      &self,
      _: Vec<NewEvent>,
      _: BatchStats,
    ) -> Result<u64, Self::Error> {
      unreachable!()
    }
    async fn cumulative(&self) -> Result<Option<CumulativeStats>, Self::Error> {
      unreachable!()
    }
    async fn put_cumulative(&self, _: CumulativeStats) -> Result<(), Self::Error> {
      unreachable!()
    }
    async fn observed_range(
      &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, Self::Error> {
      unreachable!()
    }
    async fn content_stats(&self, _: &Window) -> Result<Vec<ContentStat>, Self::Error> {
      unreachable!()
    }
    async fn replace_period_rows(
      &self,
      _: WindowKind,
      _: String,
      _: Vec<PeriodTopEntry>,
      _: Vec<PeriodLengthEntry>,
    ) -> Result<(), Self::Error> {
      unreachable!()
    }
    async fn period_top(
      &self,
      _: WindowKind,
      _: &str,
    ) -> Result<Vec<PeriodTopEntry>, Self::Error> {
      unreachable!()
    }
    async fn period_length(
      &self,
      _: WindowKind,
      _: &str,
    ) -> Result<Vec<PeriodLengthEntry>, Self::Error> {
      unreachable!()
    }
  }

  #[tokio::test]
  async fn count_mismatch_keeps_the_month_live() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, vec![
      event("s1", "december", "2019-12-10T00:00:00Z"),
      event("s2", "december", "2019-12-20T00:00:00Z"),
    ])
    .await;
    seed(&s, old_month_events()).await;

    let engine = ArchiveEngine::new(
      MiscountingStore { inner: s.clone(), bad_month: "2020-01".into() },
      ArchiveConfig {
        archive_dir:        dir.path().to_path_buf(),
        staleness_margin:   Duration::days(7),
        purge_after_export: true,
      },
    );
    let summary = engine.run_once().await.unwrap();

    // The healthy month still goes through; the bad one is reported.
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(s.archive_entry("2019-12").await.unwrap().unwrap().deleted);

    // The failed month stays fully live: bad file removed, no entry
    // recorded, no rows deleted.
    assert!(!format::archive_file_path(dir.path(), "2020-01").exists());
    assert!(s.archive_entry("2020-01").await.unwrap().is_none());
    let window = Window::from_month_id("2020-01").unwrap();
    assert_eq!(s.window_event_count(&window).await.unwrap(), 3);
  }

  #[tokio::test]
  async fn recent_months_are_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let s = store().await;
    seed(&s, vec![event("s1", "fresh", &Utc::now().to_rfc3339())]).await;

    let summary = engine(s.clone(), dir.path(), true).run_once().await.unwrap();
    assert_eq!(summary.total(), 0);
    assert!(s.list_archive_entries().await.unwrap().is_empty());
  }
}
