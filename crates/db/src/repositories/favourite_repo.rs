//! Repository for the `favourite_categories` and `favourites` tables.

use chrono::Utc;
use sqlx::SqliteExecutor;
use shirizu_core::types::DbId;

use crate::models::favourite::{CreateCategory, FavouriteCategory};

/// Column list for `favourite_categories` queries.
const CATEGORY_COLUMNS: &str = "category_id, title, sort_key, track, notifications, created_at";

/// Same columns, qualified for joins against `favourites`.
const JOINED_CATEGORY_COLUMNS: &str =
    "c.category_id, c.title, c.sort_key, c.track, c.notifications, c.created_at";

/// Favourite categories and their manga.
pub struct FavouriteRepo;

impl FavouriteRepo {
    pub async fn create_category(
        executor: impl SqliteExecutor<'_>,
        input: &CreateCategory,
    ) -> Result<FavouriteCategory, sqlx::Error> {
        let query = format!(
            "INSERT INTO favourite_categories (title, sort_key, track, notifications, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, FavouriteCategory>(&query)
            .bind(&input.title)
            .bind(input.sort_key.unwrap_or(0))
            .bind(input.track.unwrap_or(true))
            .bind(input.notifications.unwrap_or(true))
            .bind(Utc::now())
            .fetch_one(executor)
            .await
    }

    /// All categories in display order.
    pub async fn list_categories(
        executor: impl SqliteExecutor<'_>,
    ) -> Result<Vec<FavouriteCategory>, sqlx::Error> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM favourite_categories ORDER BY sort_key, category_id"
        );
        sqlx::query_as::<_, FavouriteCategory>(&query)
            .fetch_all(executor)
            .await
    }

    /// Turn update checking for a category on or off.
    pub async fn set_tracking(
        executor: impl SqliteExecutor<'_>,
        category_id: DbId,
        track: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE favourite_categories SET track = ? WHERE category_id = ?")
            .bind(track)
            .bind(category_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Put a manga into a category. Adding it twice is a no-op.
    pub async fn add(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
        category_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO favourites (manga_id, category_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (manga_id, category_id) DO NOTHING",
        )
        .bind(manga_id)
        .bind(category_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Ids of manga in at least one tracking-enabled category.
    pub async fn find_ids_with_track(
        executor: impl SqliteExecutor<'_>,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT f.manga_id FROM favourites f \
             JOIN favourite_categories c ON c.category_id = f.category_id \
             WHERE c.track = 1 \
             ORDER BY f.manga_id",
        )
        .fetch_all(executor)
        .await
    }

    /// Tracking-enabled categories containing `manga_id`, in display order.
    pub async fn find_categories_with_track(
        executor: impl SqliteExecutor<'_>,
        manga_id: DbId,
    ) -> Result<Vec<FavouriteCategory>, sqlx::Error> {
        let query = format!(
            "SELECT {JOINED_CATEGORY_COLUMNS} FROM favourite_categories c \
             JOIN favourites f ON f.category_id = c.category_id \
             WHERE f.manga_id = ? AND c.track = 1 \
             ORDER BY c.sort_key, c.category_id"
        );
        sqlx::query_as::<_, FavouriteCategory>(&query)
            .bind(manga_id)
            .fetch_all(executor)
            .await
    }
}
