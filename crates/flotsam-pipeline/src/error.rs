use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The buffer was full and the configured policy gave up on the event.
  #[error("ingestion buffer is at capacity")]
  CapacityExceeded,
  /// The writer side has shut down; no further events can be accepted.
  #[error("ingestion buffer is closed")]
  BufferClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
