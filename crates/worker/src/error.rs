use shirizu_tracker::TrackerError;

/// Errors that abort a whole worker run.
///
/// Problems with a single manga never end up here; they are reported as
/// failed checks inside the run.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Failed to encode retry set: {0}")]
    RetrySet(#[from] serde_json::Error),
}
