//! Repository for the `tracks` table.

use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};
use shirizu_core::types::DbId;

use crate::models::manga::MangaRow;
use crate::models::track::{Track, TrackWithManga};

/// Column list for `tracks` queries.
const COLUMNS: &str =
    "manga_id, last_chapter_id, chapters_new, last_check_time, last_chapter_date, last_result";

/// Columns of [`TrackWithManga`], for `tracks t JOIN manga m`.
const JOINED_COLUMNS: &str = "t.manga_id, t.last_chapter_id, t.chapters_new, t.last_check_time, \
    m.title, m.url, m.public_url, m.cover_url, m.source, m.is_nsfw";

/// Never-checked rows (NULL) sort first under `ASC`.
const CHECK_ORDER: &str = "ORDER BY t.last_check_time ASC, t.manga_id ASC";

/// Tracking cursors, one per tracked manga.
pub struct TrackRepo;

impl TrackRepo {
    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<Option<Track>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tracks WHERE manga_id = ?");
        sqlx::query_as::<_, Track>(&query)
            .bind(manga_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_all_ids(executor: impl SqliteExecutor<'_>) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT manga_id FROM tracks")
            .fetch_all(executor)
            .await
    }

    /// A page of cursors, least recently checked first.
    pub async fn find_page(
        executor: impl SqliteExecutor<'_>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TrackWithManga>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_COLUMNS} FROM tracks t \
             JOIN manga m ON m.manga_id = t.manga_id \
             {CHECK_ORDER} \
             LIMIT ? OFFSET ?"
        );
        sqlx::query_as::<_, TrackWithManga>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Cursors of the given manga, least recently checked first. Ids without
    /// a track row are skipped.
    pub async fn find_by_ids(
        executor: impl SqliteExecutor<'_>,
        ids: &[DbId],
    ) -> Result<Vec<TrackWithManga>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {JOINED_COLUMNS} FROM tracks t \
             JOIN manga m ON m.manga_id = t.manga_id \
             WHERE t.manga_id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(format!(") {CHECK_ORDER}"));
        builder
            .build_query_as::<TrackWithManga>()
            .fetch_all(executor)
            .await
    }

    /// Insert or replace a cursor.
    pub async fn upsert(executor: impl SqliteExecutor<'_>, track: &Track) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tracks \
                (manga_id, last_chapter_id, chapters_new, last_check_time, last_chapter_date, last_result) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (manga_id) DO UPDATE SET \
                last_chapter_id = excluded.last_chapter_id, \
                chapters_new = excluded.chapters_new, \
                last_check_time = excluded.last_check_time, \
                last_chapter_date = excluded.last_chapter_date, \
                last_result = excluded.last_result",
        )
        .bind(track.manga_id)
        .bind(track.last_chapter_id)
        .bind(track.chapters_new)
        .bind(track.last_check_time)
        .bind(track.last_chapter_date)
        .bind(track.last_result)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete(executor: impl SqliteExecutor<'_>, manga_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tracks WHERE manga_id = ?")
            .bind(manga_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete cursors of manga that are neither in the reading history nor
    /// in a tracking-enabled favourite category.
    pub async fn gc(executor: impl SqliteExecutor<'_>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM tracks WHERE manga_id NOT IN ( \
                SELECT manga_id FROM history \
                UNION \
                SELECT f.manga_id FROM favourites f \
                JOIN favourite_categories c ON c.category_id = f.category_id \
                WHERE c.track = 1)",
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reset the unseen counter of one manga.
    pub async fn clear_counter(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tracks SET chapters_new = 0 WHERE manga_id = ?")
            .bind(manga_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Reset every unseen counter.
    pub async fn clear_counters(executor: impl SqliteExecutor<'_>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE tracks SET chapters_new = 0 WHERE chapters_new <> 0")
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_new_chapters(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT chapters_new FROM tracks WHERE manga_id = ?")
            .bind(manga_id)
            .fetch_optional(executor)
            .await
    }

    /// `(manga_id, chapters_new)` for every manga with unseen chapters.
    pub async fn new_chapters_map(
        executor: impl SqliteExecutor<'_>,
    ) -> Result<Vec<(DbId, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (DbId, i64)>(
            "SELECT manga_id, chapters_new FROM tracks WHERE chapters_new > 0",
        )
        .fetch_all(executor)
        .await
    }

    /// Number of manga with at least one unseen chapter.
    pub async fn count_updated(executor: impl SqliteExecutor<'_>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tracks WHERE chapters_new > 0")
            .fetch_one(executor)
            .await
    }

    /// Manga with unseen chapters, most unseen first. `None` lists all.
    pub async fn find_updated_manga(
        executor: impl SqliteExecutor<'_>,
        limit: Option<i64>,
    ) -> Result<Vec<MangaRow>, sqlx::Error> {
        sqlx::query_as::<_, MangaRow>(
            "SELECT m.manga_id, m.title, m.url, m.public_url, m.cover_url, m.source, m.is_nsfw \
             FROM tracks t JOIN manga m ON m.manga_id = t.manga_id \
             WHERE t.chapters_new > 0 \
             ORDER BY t.chapters_new DESC, t.manga_id ASC \
             LIMIT ?",
        )
        // SQLite treats a negative limit as unbounded.
        .bind(limit.unwrap_or(-1))
        .fetch_all(executor)
        .await
    }
}
