use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] flotsam_core::Error),
  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),
  /// The exported file disagrees with the live row count; the export was
  /// discarded and the window stays live.
  #[error(
    "archive integrity check failed for {window_id}: store has {expected} rows, file has {actual}"
  )]
  Integrity {
    window_id: String,
    expected:  u64,
    actual:    u64,
  },
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Parquet(#[from] parquet::errors::ParquetError),
  #[error(transparent)]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("archive file column has unexpected type: {0}")]
  ArchiveSchema(&'static str),
  #[error("archive file timestamp out of range")]
  ArchiveTimestamp,
}

impl Error {
  /// Box a backend error behind the store abstraction.
  pub fn store<E>(err: E) -> Self
  where E: std::error::Error + Send + Sync + 'static {
    Error::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
