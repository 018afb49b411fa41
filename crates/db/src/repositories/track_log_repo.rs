//! Repository for the `track_logs` table.

use sqlx::SqliteExecutor;
use shirizu_core::types::{DbId, Timestamp};

use crate::models::track_log::TrackLogWithManga;

/// Append-only log of detected updates.
pub struct TrackLogRepo;

impl TrackLogRepo {
    pub async fn insert(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
        chapters: &str,
        created_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO track_logs (manga_id, chapters, created_at) VALUES (?, ?, ?)")
                .bind(manga_id)
                .bind(chapters)
                .bind(created_at)
                .execute(executor)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Newest entries first.
    pub async fn list(
        executor: impl SqliteExecutor<'_>,
        limit: i64,
    ) -> Result<Vec<TrackLogWithManga>, sqlx::Error> {
        sqlx::query_as::<_, TrackLogWithManga>(
            "SELECT l.id, l.manga_id, l.chapters, l.created_at, \
                m.title, m.url, m.public_url, m.cover_url, m.source, m.is_nsfw \
             FROM track_logs l JOIN manga m ON m.manga_id = l.manga_id \
             ORDER BY l.created_at DESC, l.id DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn count(executor: impl SqliteExecutor<'_>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM track_logs")
            .fetch_one(executor)
            .await
    }

    pub async fn clear(executor: impl SqliteExecutor<'_>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM track_logs").execute(executor).await?;
        Ok(result.rows_affected())
    }

    /// Delete entries of manga that are no longer tracked.
    pub async fn gc(executor: impl SqliteExecutor<'_>) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM track_logs WHERE manga_id NOT IN (SELECT manga_id FROM tracks)")
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    /// Keep only the newest `keep` entries.
    pub async fn trim(executor: impl SqliteExecutor<'_>, keep: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM track_logs WHERE id NOT IN ( \
                SELECT id FROM track_logs ORDER BY created_at DESC, id DESC LIMIT ?)",
        )
        .bind(keep)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
