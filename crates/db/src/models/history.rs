//! Reading history row.

use serde::Serialize;
use sqlx::FromRow;
use shirizu_core::types::{DbId, Timestamp};

/// A row from the `history` table: where the user stopped reading a manga.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryRecord {
    pub manga_id: DbId,
    pub chapter_id: DbId,
    pub page: i32,
    /// Reading progress through the whole manga, `0.0..=1.0`.
    pub percent: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
