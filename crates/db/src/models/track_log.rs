//! Update log rows.
//!
//! Each entry records the chapter names found by one successful check. The
//! names are stored newline-joined in a single column.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;
use shirizu_core::manga::{Manga, MangaSource};
use shirizu_core::types::{DbId, Timestamp};

/// A row from `track_logs` joined with its manga summary.
#[derive(Debug, Clone, FromRow)]
pub struct TrackLogWithManga {
    pub id: DbId,
    pub manga_id: DbId,
    pub chapters: String,
    pub created_at: Timestamp,
    pub title: String,
    pub url: String,
    pub public_url: String,
    pub cover_url: Option<String>,
    pub source: String,
    pub is_nsfw: bool,
}

/// A log entry ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingLogItem {
    pub id: DbId,
    pub manga: Manga,
    pub chapters: Vec<String>,
    pub created_at: Timestamp,
    /// Entry still falls within the manga's unseen-chapter counter.
    pub is_new: bool,
}

/// Join chapter names for storage.
pub fn join_chapters(names: &[String]) -> String {
    names.join("\n")
}

impl TrackLogWithManga {
    /// Convert into a display item.
    ///
    /// `counters` holds the remaining unseen count per manga and is consumed
    /// as entries are converted, newest first, so only the entries covered
    /// by the counter are flagged as new.
    pub fn into_item(self, counters: &mut HashMap<DbId, i64>) -> TrackingLogItem {
        let chapters: Vec<String> = self
            .chapters
            .split('\n')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let remaining = counters.entry(self.manga_id).or_insert(0);
        let is_new = *remaining > 0;
        *remaining -= chapters.len() as i64;

        TrackingLogItem {
            id: self.id,
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
            chapters,
            created_at: self.created_at,
            is_new,
        }
    }
}
