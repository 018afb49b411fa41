//! Well-known notification channel ids.
//!
//! Update notifications are posted to a per-category channel for manga in a
//! tracked favourites category, and to the shared history channel for manga
//! that are only in the reading history.

use crate::types::DbId;

/// Channel for manga tracked through the reading history.
pub const CHANNEL_HISTORY: &str = "track_history";

/// Channel used by the worker's progress notification.
pub const CHANNEL_WORKER: &str = "track_worker";

/// Prefix of per-category favourites channels.
const FAVOURITES_PREFIX: &str = "track_fav_";

/// Channel id for a favourites category.
pub fn favourites_channel_id(category_id: DbId) -> String {
    format!("{FAVOURITES_PREFIX}{category_id}")
}
