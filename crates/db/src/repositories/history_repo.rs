//! Repository for the `history` table.

use chrono::Utc;
use sqlx::SqliteExecutor;
use shirizu_core::types::DbId;

use crate::models::history::HistoryRecord;

const COLUMNS: &str = "manga_id, chapter_id, page, percent, created_at, updated_at";

/// Reading progress per manga.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Record that the user is reading `chapter_id` of a manga.
    pub async fn upsert(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
        chapter_id: DbId,
        page: i32,
        percent: f64,
    ) -> Result<HistoryRecord, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO history (manga_id, chapter_id, page, percent, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (manga_id) DO UPDATE SET \
                chapter_id = excluded.chapter_id, \
                page = excluded.page, \
                percent = excluded.percent, \
                updated_at = excluded.updated_at \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(manga_id)
            .bind(chapter_id)
            .bind(page)
            .bind(percent)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM history WHERE manga_id = ?");
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(manga_id)
            .fetch_optional(executor)
            .await
    }

    /// Ids of every manga in the reading history.
    pub async fn find_all_ids(executor: impl SqliteExecutor<'_>) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT manga_id FROM history ORDER BY manga_id")
            .fetch_all(executor)
            .await
    }

    /// Overwrite the progress percentage without touching `updated_at`.
    pub async fn update_percent(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
        percent: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE history SET percent = ? WHERE manga_id = ?")
            .bind(percent)
            .bind(manga_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete(executor: impl SqliteExecutor<'_>, manga_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM history WHERE manga_id = ?")
            .bind(manga_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
