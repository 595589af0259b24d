//! Per-run accounting shared by the window-oriented jobs.

use std::fmt;

/// What happened to one window during a run. Failures are recorded, not
/// propagated; each window is processed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
  Completed,
  Skipped(String),
  Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
  pub outcomes: Vec<(String, WindowOutcome)>,
}

impl RunSummary {
  pub fn push(&mut self, window_id: impl Into<String>, outcome: WindowOutcome) {
    self.outcomes.push((window_id.into(), outcome));
  }

  pub fn completed(&self) -> usize {
    self.count(|o| matches!(o, WindowOutcome::Completed))
  }

  pub fn skipped(&self) -> usize {
    self.count(|o| matches!(o, WindowOutcome::Skipped(_)))
  }

  pub fn failed(&self) -> usize {
    self.count(|o| matches!(o, WindowOutcome::Failed(_)))
  }

  pub fn total(&self) -> usize {
    self.outcomes.len()
  }

  fn count(&self, pred: impl Fn(&WindowOutcome) -> bool) -> usize {
    self.outcomes.iter().filter(|(_, o)| pred(o)).count()
  }
}

impl fmt::Display for RunSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} of {} windows processed ({} skipped, {} failed)",
      self.completed(),
      self.total(),
      self.skipped(),
      self.failed()
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn summary_counts_and_formats() {
    let mut summary = RunSummary::default();
    summary.push("2026-01", WindowOutcome::Completed);
    summary.push("2026-02", WindowOutcome::Skipped("already exported".into()));
    summary.push("2026-03", WindowOutcome::Failed("disk full".into()));
    summary.push("2026-04", WindowOutcome::Completed);

    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.to_string(), "2 of 4 windows processed (1 skipped, 1 failed)");
  }
}
