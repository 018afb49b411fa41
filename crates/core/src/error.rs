/// Why a single manga update check failed.
///
/// Carried inside [`MangaUpdates::Failure`](crate::tracking::MangaUpdates)
/// so it must be cheap to clone and free of borrowed data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// The source asked us to slow down.
    #[error("Rate limited by source (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The site answered with an anti-bot challenge page.
    #[error("Source is protected by Cloudflare: {url}")]
    CloudflareProtected { url: String },

    /// The source answered with an unexpected HTTP status.
    #[error("Source returned HTTP {status}")]
    Http { status: u16 },

    /// The manga no longer exists on the source.
    #[error("Manga not found on source")]
    NotFound,

    /// The manga belongs to a source that cannot be checked for updates.
    #[error("Repository {0} is not supported")]
    UnsupportedSource(String),

    /// The fetched details carry no chapter list.
    #[error("Manga details have no chapter list")]
    MissingChapters,

    /// The source response could not be decoded.
    #[error("Failed to parse source response: {0}")]
    Parse(String),

    /// Persisting the result failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The check task ended without producing a result.
    #[error("Check aborted: {0}")]
    Aborted(String),
}

impl CheckError {
    /// Whether the manga should be rechecked on the next (retry) run.
    ///
    /// Transient transport problems and site protection are retryable; the
    /// worker's attempt cap bounds how often that happens.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout
            | Self::RateLimited { .. }
            | Self::CloudflareProtected { .. } => true,
            Self::Http { status } => *status >= 500,
            Self::NotFound
            | Self::UnsupportedSource(_)
            | Self::MissingChapters
            | Self::Parse(_)
            | Self::Storage(_)
            | Self::Aborted(_) => false,
        }
    }
}
