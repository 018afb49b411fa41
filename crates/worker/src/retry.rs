//! The persisted retry set.
//!
//! Ids of manga whose last check failed with a retryable error. Stored as a
//! JSON array in the `worker_state` table so it survives restarts.

use std::collections::BTreeSet;

use shirizu_core::types::DbId;
use shirizu_db::repositories::WorkerStateRepo;
use shirizu_db::DbPool;

use crate::error::WorkerError;

pub const RETRY_KEY: &str = "retry";

/// Load the retry set. Empty when nothing (or nothing readable) is stored.
pub async fn load(pool: &DbPool) -> Result<BTreeSet<DbId>, WorkerError> {
    let Some(raw) = WorkerStateRepo::get(pool, RETRY_KEY).await? else {
        return Ok(BTreeSet::new());
    };
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Discarding unreadable retry set");
        BTreeSet::new()
    }))
}

/// Replace the retry set. An empty set removes the entry.
pub async fn store(pool: &DbPool, ids: &BTreeSet<DbId>) -> Result<(), WorkerError> {
    if ids.is_empty() {
        WorkerStateRepo::delete(pool, RETRY_KEY).await?;
    } else {
        let raw = serde_json::to_string(ids)?;
        WorkerStateRepo::set(pool, RETRY_KEY, &raw).await?;
    }
    Ok(())
}
