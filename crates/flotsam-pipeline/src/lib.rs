//! In-process ingestion pipeline: a bounded buffer decoupling event
//! producers from a single batch writer that persists to an
//! [`EventStore`](flotsam_core::store::EventStore).

mod buffer;
pub mod error;
mod writer;

pub use buffer::{Backpressure, EventBuffer, EventReceiver, channel};
pub use error::{Error, Result};
pub use writer::{BatchWriter, WriterConfig, WriterStats};
