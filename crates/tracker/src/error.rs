use shirizu_core::error::CheckError;

/// Errors surfaced by the tracker to its callers.
///
/// Failures of a single manga check are not errors: they are reported as
/// [`MangaUpdates::Failure`](shirizu_core::tracking::MangaUpdates). This type
/// covers what the tracker itself cannot recover from.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Source(#[from] CheckError),
}
