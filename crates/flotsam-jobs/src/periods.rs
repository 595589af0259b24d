//! Refresh of per-window aggregates: the thresholded top list and the
//! length histogram, for every week and month touching the live data.

use flotsam_core::{
  period,
  store::EventStore,
  window::{Window, WindowKind, windows_spanning},
};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  summary::{RunSummary, WindowOutcome},
};

#[derive(Debug, Clone)]
pub struct PeriodConfig {
  /// K-anonymity floor: contents seen by fewer distinct subjects than
  /// this never appear in the top list.
  pub min_distinct_subjects: u64,
  /// Word-count histogram cap; longer contents land in the last bucket.
  pub max_length_bucket:     u32,
}

pub struct PeriodAggregator<S> {
  store:  S,
  config: PeriodConfig,
}

impl<S: EventStore> PeriodAggregator<S> {
  pub fn new(store: S, config: PeriodConfig) -> Self {
    PeriodAggregator { store, config }
  }

  /// Recompute every week and month spanning the live data. Windows are
  /// independent; failures are recorded and the run continues.
  pub async fn run_once(&self) -> Result<RunSummary> {
    let Some((min, max)) = self.store.observed_range().await.map_err(Error::store)? else {
      return Ok(RunSummary::default());
    };

    let mut summary = RunSummary::default();
    for kind in [WindowKind::Week, WindowKind::Month] {
      for window in windows_spanning(kind, min, max) {
        match self.refresh_window(&window).await {
          Ok(()) => summary.push(window.id, WindowOutcome::Completed),
          Err(err) => {
            warn!(%err, window = %window.id, "period refresh failed");
            summary.push(window.id, WindowOutcome::Failed(err.to_string()));
          }
        }
      }
    }
    Ok(summary)
  }

  /// Replace one window's aggregate rows from its current live events.
  /// Deterministic per input, so re-running is byte-stable.
  pub async fn refresh_window(&self, window: &Window) -> Result<()> {
    let stats = self.store.content_stats(window).await.map_err(Error::store)?;
    let top = period::rank_top(window, &stats, self.config.min_distinct_subjects);
    let length = period::length_histogram(window, &stats, self.config.max_length_bucket);
    debug!(
      window = %window.id,
      contents = stats.len(),
      ranked = top.len(),
      "refreshing period aggregates"
    );
    self
      .store
      .replace_period_rows(window.kind, window.id.clone(), top, length)
      .await
      .map_err(Error::store)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
