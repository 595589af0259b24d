//! Error types for `flotsam-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Invalid or missing configuration. Fatal at startup; the pipeline
  /// refuses to run partially configured.
  #[error("configuration error: {0}")]
  Config(String),

  #[error("invalid window id: {0:?}")]
  WindowParse(String),

  #[error("unknown window kind: {0:?}")]
  WindowKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
