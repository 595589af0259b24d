//! Content normalization used at aggregation time.
//!
//! Raw `content_text` is stored verbatim; these helpers are applied only
//! when computing aggregate rows.

/// Aggregation-time normalization: trimmed, lowercased.
pub fn normalize(content: &str) -> String {
  content.trim().to_lowercase()
}

/// Word-count bucket for the length histogram, clamped at `cap` to bound
/// table cardinality.
pub fn length_bucket(normalized: &str, cap: u32) -> u32 {
  (normalized.split_whitespace().count() as u32).min(cap)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_trims_and_lowercases() {
    assert_eq!(normalize("  Radiohead OK Computer  "), "radiohead ok computer");
  }

  #[test]
  fn bucket_counts_words() {
    assert_eq!(length_bucket("alpha beta", 100), 2);
    assert_eq!(length_bucket("one", 100), 1);
    assert_eq!(length_bucket("", 100), 0);
  }

  #[test]
  fn bucket_collapses_repeated_whitespace() {
    assert_eq!(length_bucket("a  b \t c", 100), 3);
  }

  #[test]
  fn bucket_is_capped() {
    let long = "w ".repeat(500);
    assert_eq!(length_bucket(long.trim(), 100), 100);
  }
}
