//! Tracking cursors, per-check results and tracking constants.

use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::manga::{Manga, MangaChapter};
use crate::types::{DbId, Timestamp, NO_ID};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of update-log entries kept after garbage collection.
pub const MAX_LOG_SIZE: i64 = 120;

/// Maximum number of manga checked concurrently by one worker run.
pub const MAX_PARALLELISM: usize = 3;

/// Worker attempts after which failed manga are no longer retried.
pub const MAX_ATTEMPTS: u32 = 3;

/// Interval of the periodic update check.
pub const CHECK_INTERVAL_HOURS: u64 = 4;

/// Linear backoff step between retries of a failed run.
pub const RETRY_BACKOFF_MINUTES: u64 = 30;

// ---------------------------------------------------------------------------
// TrackResult
// ---------------------------------------------------------------------------

/// Outcome of the last check of a tracked manga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackResult {
    #[default]
    None,
    HasUpdate,
    NoUpdate,
    Failed,
}

impl TrackResult {
    /// Integer representation for database storage.
    pub fn id(self) -> i16 {
        match self {
            Self::None => 0,
            Self::HasUpdate => 1,
            Self::NoUpdate => 2,
            Self::Failed => 3,
        }
    }

    /// Parse from the stored integer, defaulting to `None` for unknown values.
    pub fn from_id(id: i16) -> Self {
        match id {
            1 => Self::HasUpdate,
            2 => Self::NoUpdate,
            3 => Self::Failed,
            _ => Self::None,
        }
    }
}

// ---------------------------------------------------------------------------
// MangaTracking
// ---------------------------------------------------------------------------

/// The persisted "what was last seen" cursor of one manga.
#[derive(Debug, Clone, PartialEq)]
pub struct MangaTracking {
    pub manga: Manga,
    pub last_chapter_id: DbId,
    pub last_check: Option<Timestamp>,
}

impl MangaTracking {
    /// Cursor of a manga that was never checked.
    pub fn empty(manga: Manga) -> Self {
        Self {
            manga,
            last_chapter_id: NO_ID,
            last_check: None,
        }
    }

    /// `true` on the first check or when the manga had no chapters last time.
    pub fn is_empty(&self) -> bool {
        self.last_chapter_id == NO_ID
    }
}

// ---------------------------------------------------------------------------
// MangaUpdates
// ---------------------------------------------------------------------------

/// A completed comparison of a manga against its cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCheck {
    /// Freshly fetched details, including the full chapter list.
    pub manga: Manga,
    pub new_chapters: Vec<MangaChapter>,
    /// `false` when the baseline chapter could not be located; such a result
    /// resets the unseen counter and never produces a notification.
    pub is_valid: bool,
    pub channel_id: Option<String>,
}

impl UpdateCheck {
    pub fn has_new_chapters(&self) -> bool {
        !self.new_chapters.is_empty()
    }

    /// Valid and with at least one new chapter.
    pub fn is_notifiable(&self) -> bool {
        self.is_valid && self.has_new_chapters()
    }

    /// Newest upload date in the fetched list, if any chapter carries one.
    pub fn last_chapter_date(&self) -> Option<Timestamp> {
        self.manga
            .chapters
            .as_ref()?
            .iter()
            .filter_map(|c| c.upload_date)
            .max()
    }
}

/// A check that could not be completed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCheck {
    pub manga: Manga,
    pub error: CheckError,
}

impl FailedCheck {
    pub fn should_retry(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Result of checking one manga for new chapters.
#[derive(Debug, Clone, PartialEq)]
pub enum MangaUpdates {
    Success(UpdateCheck),
    Failure(FailedCheck),
}

impl MangaUpdates {
    pub fn failure(manga: Manga, error: CheckError) -> Self {
        Self::Failure(FailedCheck { manga, error })
    }

    pub fn manga(&self) -> &Manga {
        match self {
            Self::Success(s) => &s.manga,
            Self::Failure(f) => &f.manga,
        }
    }

    /// Attach the notification channel resolved for this manga's batch item.
    ///
    /// Failures carry no channel and are returned unchanged.
    pub fn with_channel(self, channel_id: Option<String>) -> Self {
        match self {
            Self::Success(s) => Self::Success(UpdateCheck { channel_id, ..s }),
            failure => failure,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackingItem
// ---------------------------------------------------------------------------

/// A cursor scheduled for checking, with the channel its notification goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingItem {
    pub tracking: MangaTracking,
    /// `None` when notifications are disabled for this manga.
    pub channel_id: Option<String>,
}
