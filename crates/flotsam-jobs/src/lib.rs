//! Maintenance jobs over the event store: monthly archival to parquet,
//! per-window statistics refresh, and cumulative-stats rebuild.

pub mod archive;
pub mod error;
pub mod format;
pub mod periods;
pub mod rebuild;
pub mod summary;

pub use archive::{ArchiveConfig, ArchiveEngine};
pub use error::{Error, Result};
pub use periods::{PeriodAggregator, PeriodConfig};
pub use rebuild::rebuild_cumulative;
pub use summary::{RunSummary, WindowOutcome};
