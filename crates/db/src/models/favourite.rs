//! Favourite category models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use shirizu_core::types::{DbId, Timestamp};

/// A row from the `favourite_categories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FavouriteCategory {
    pub category_id: DbId,
    pub title: String,
    pub sort_key: i32,
    /// Manga in this category are checked for updates.
    pub track: bool,
    /// Updates of manga in this category produce notifications.
    pub notifications: bool,
    pub created_at: Timestamp,
}

/// DTO for creating a favourite category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub title: String,
    pub sort_key: Option<i32>,
    pub track: Option<bool>,
    pub notifications: Option<bool>,
}
