//! Repository for the `worker_state` key/value table.
//!
//! Values are opaque strings; callers store JSON.

use chrono::Utc;
use sqlx::SqliteExecutor;

pub struct WorkerStateRepo;

impl WorkerStateRepo {
    pub async fn get(executor: impl SqliteExecutor<'_>, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM worker_state WHERE key = ?")
            .bind(key)
            .fetch_optional(executor)
            .await
    }

    pub async fn set(executor: impl SqliteExecutor<'_>, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO worker_state (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete(executor: impl SqliteExecutor<'_>, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM worker_state WHERE key = ?")
            .bind(key)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
