//! Manga catalogue row.

use serde::Serialize;
use sqlx::FromRow;
use shirizu_core::manga::{Manga, MangaSource};
use shirizu_core::types::DbId;

/// A row from the `manga` table. Chapters are never stored here.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MangaRow {
    pub manga_id: DbId,
    pub title: String,
    pub url: String,
    pub public_url: String,
    pub cover_url: Option<String>,
    pub source: String,
    pub is_nsfw: bool,
}

impl MangaRow {
    /// Summary manga without a chapter list.
    pub fn into_manga(self) -> Manga {
        Manga {
            id: self.manga_id,
            title: self.title,
            url: self.url,
            public_url: self.public_url,
            cover_url: self.cover_url,
            source: MangaSource::from(self.source),
            is_nsfw: self.is_nsfw,
            chapters: None,
        }
    }
}
