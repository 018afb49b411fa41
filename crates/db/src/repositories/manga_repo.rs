//! Repository for the `manga` table.

use sqlx::SqliteExecutor;
use shirizu_core::manga::Manga;
use shirizu_core::types::DbId;

use crate::models::manga::MangaRow;

/// Column list for `manga` queries.
const COLUMNS: &str = "manga_id, title, url, public_url, cover_url, source, is_nsfw";

/// Stores manga summaries. Chapter lists are never persisted.
pub struct MangaRepo;

impl MangaRepo {
    /// Insert or refresh the summary of `manga`.
    pub async fn upsert(executor: impl SqliteExecutor<'_>, manga: &Manga) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO manga (manga_id, title, url, public_url, cover_url, source, is_nsfw) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (manga_id) DO UPDATE SET \
                title = excluded.title, \
                url = excluded.url, \
                public_url = excluded.public_url, \
                cover_url = excluded.cover_url, \
                source = excluded.source, \
                is_nsfw = excluded.is_nsfw",
        )
        .bind(manga.id)
        .bind(&manga.title)
        .bind(&manga.url)
        .bind(&manga.public_url)
        .bind(&manga.cover_url)
        .bind(manga.source.as_str())
        .bind(manga.is_nsfw)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<Option<MangaRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM manga WHERE manga_id = ?");
        sqlx::query_as::<_, MangaRow>(&query)
            .bind(manga_id)
            .fetch_optional(executor)
            .await
    }

    /// Delete a manga. Its history, favourites, track and logs cascade.
    pub async fn delete(executor: impl SqliteExecutor<'_>, manga_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM manga WHERE manga_id = ?")
            .bind(manga_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
