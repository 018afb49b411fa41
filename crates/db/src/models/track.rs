//! Tracking cursor rows and the pure merge rules applied to them.

use serde::Serialize;
use sqlx::FromRow;
use shirizu_core::manga::{Manga, MangaSource};
use shirizu_core::tracking::{MangaTracking, MangaUpdates, TrackResult};
use shirizu_core::types::{DbId, Timestamp, NO_ID};

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A row from the `tracks` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Track {
    pub manga_id: DbId,
    pub last_chapter_id: DbId,
    /// Chapters published since the user last acknowledged this manga.
    pub chapters_new: i32,
    pub last_check_time: Option<Timestamp>,
    pub last_chapter_date: Option<Timestamp>,
    pub last_result: i16,
}

impl Track {
    /// Fresh cursor for a manga that was never checked.
    pub fn create(manga_id: DbId) -> Self {
        Self {
            manga_id,
            last_chapter_id: NO_ID,
            chapters_new: 0,
            last_check_time: None,
            last_chapter_date: None,
            last_result: TrackResult::None.id(),
        }
    }

    pub fn result(&self) -> TrackResult {
        TrackResult::from_id(self.last_result)
    }

    /// Apply the outcome of a check.
    ///
    /// A failure only stamps the check time. A success moves the cursor to
    /// the last fetched chapter (kept when the list is empty); a valid one adds its new chapters to the
    /// unseen counter while an invalid one resets it.
    pub fn merge_with(self, updates: &MangaUpdates, now: Timestamp) -> Self {
        match updates {
            MangaUpdates::Failure(_) => Self {
                last_check_time: Some(now),
                last_result: TrackResult::Failed.id(),
                ..self
            },
            MangaUpdates::Success(check) => {
                let last_chapter_id = check
                    .manga
                    .last_chapter()
                    .map_or(self.last_chapter_id, |c| c.id);
                let chapters_new = if check.is_valid {
                    self.chapters_new + check.new_chapters.len() as i32
                } else {
                    0
                };
                let result = if check.has_new_chapters() {
                    TrackResult::HasUpdate
                } else {
                    TrackResult::NoUpdate
                };
                Self {
                    manga_id: self.manga_id,
                    last_chapter_id,
                    chapters_new,
                    last_check_time: Some(now),
                    last_chapter_date: self.last_chapter_date.max(check.last_chapter_date()),
                    last_result: result.id(),
                }
            }
        }
    }

    /// Bring the cursor in line with a chapter the user just read.
    ///
    /// Returns `None` when `manga` carries no chapter list. Reading inside
    /// the trailing window of new chapters shrinks the unseen counter to the
    /// chapters after the read one; the cursor always moves to the last
    /// chapter of the list and the check time is refreshed.
    pub fn synced_with_reading(
        &self,
        manga: &Manga,
        chapter_id: DbId,
        now: Timestamp,
    ) -> Option<Self> {
        let chapters = manga.chapters.as_ref()?;
        let total = chapters.len() as i64;
        let first_new = total - i64::from(self.chapters_new);
        let chapters_new = match manga.chapter_index(chapter_id) {
            _ if self.chapters_new == 0 => 0,
            Some(i) if i as i64 >= first_new => (total - 1 - i as i64) as i32,
            _ => self.chapters_new,
        };
        let last = chapters.last();
        Some(Self {
            manga_id: self.manga_id,
            last_chapter_id: last.map_or(NO_ID, |c| c.id),
            chapters_new,
            last_check_time: Some(now),
            last_chapter_date: self.last_chapter_date.max(last.and_then(|c| c.upload_date)),
            last_result: self.last_result,
        })
    }
}

// ---------------------------------------------------------------------------
// TrackWithManga
// ---------------------------------------------------------------------------

/// A tracking row joined with its manga summary.
#[derive(Debug, Clone, FromRow)]
pub struct TrackWithManga {
    pub manga_id: DbId,
    pub last_chapter_id: DbId,
    pub chapters_new: i32,
    pub last_check_time: Option<Timestamp>,
    pub title: String,
    pub url: String,
    pub public_url: String,
    pub cover_url: Option<String>,
    pub source: String,
    pub is_nsfw: bool,
}

impl TrackWithManga {
    pub fn into_tracking(self) -> MangaTracking {
        MangaTracking {
            manga: Manga {
                id: self.manga_id,
                title: self.title,
                url: self.url,
                public_url: self.public_url,
                cover_url: self.cover_url,
                source: MangaSource::from(self.source),
                is_nsfw: self.is_nsfw,
                chapters: None,
            },
            last_chapter_id: self.last_chapter_id,
            last_check: self.last_check_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
