//! Background update checking.
//!
//! [`TrackWorker`] runs one pass over the tracked manga; [`TrackScheduler`]
//! decides when passes happen (periodic, on demand, and retries with
//! backoff). Both are wired together by the `shirizu-worker` binary.

pub mod config;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod track_worker;

pub use config::{ConfigError, WorkerConfig};
pub use error::WorkerError;
pub use scheduler::{SchedulerSettings, TrackScheduler};
pub use track_worker::{RunSummary, TrackWorker, WorkOutcome, WorkerSettings};
