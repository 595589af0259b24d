//! Cumulative-stats rebuild, the recovery path for a lost or corrupted
//! totals row.
//!
//! Distinct counts are re-summed per month rather than per original
//! batch, so a rebuild can differ slightly from the incrementally
//! maintained row; totals and the seen range are exact.

use flotsam_core::{
  event::NewEvent,
  stats::{BatchStats, CumulativeStats},
  store::EventStore,
  window::{WindowKind, windows_spanning},
};
use tracing::info;

use crate::{Error, Result, format};

pub async fn rebuild_cumulative<S: EventStore>(store: &S) -> Result<CumulativeStats> {
  let mut rebuilt = CumulativeStats::default();

  // Purged months survive only in their archive files.
  for entry in store.list_archive_entries().await.map_err(Error::store)? {
    if !entry.deleted {
      continue;
    }
    let records = format::read_archive(&entry.file_path)?;
    rebuilt.absorb(&BatchStats::from_records(&records));
  }

  // Live rows, one month at a time. Months with an undeleted archive
  // entry are still live and counted here, not from their file.
  if let Some((min, max)) = store.observed_range().await.map_err(Error::store)? {
    for window in windows_spanning(WindowKind::Month, min, max) {
      let records: Vec<NewEvent> = store
        .window_events(&window)
        .await
        .map_err(Error::store)?
        .into_iter()
        .map(NewEvent::from)
        .collect();
      if records.is_empty() {
        continue;
      }
      rebuilt.absorb(&BatchStats::from_records(&records));
    }
  }

  store.put_cumulative(rebuilt.clone()).await.map_err(Error::store)?;
  info!(
    records = rebuilt.total_records,
    sources = rebuilt.per_source_totals.len(),
    "rebuilt cumulative stats"
  );
  Ok(rebuilt)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
