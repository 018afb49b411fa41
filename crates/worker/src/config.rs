use std::str::FromStr;
use std::time::Duration;

use shirizu_core::tracking::{
    CHECK_INTERVAL_HOURS, MAX_ATTEMPTS, MAX_PARALLELISM, RETRY_BACKOFF_MINUTES,
};

use crate::scheduler::SchedulerSettings;
use crate::track_worker::{WorkerSettings, DEFAULT_BATCH_LIMIT};

/// Returned when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be a valid {expected}, got {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub database_url: String,
    /// When `false`, every run succeeds without checking anything.
    pub enabled: bool,
    pub interval_hours: u64,
    /// Linear backoff step between retries of a failed run.
    pub retry_backoff_mins: u64,
    pub max_parallelism: usize,
    pub max_attempts: u32,
    /// Upper bound on manga checked by one full run.
    pub batch_limit: i64,
    /// Notify about manga tracked only through the reading history.
    pub history_notifications: bool,
    pub source_base_url: String,
    pub source_timeout_secs: u64,
    /// Webhook receiving update notifications. Unset means log only.
    pub webhook_url: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                      |
    /// |---------------------------------|------------------------------|
    /// | `DATABASE_URL`                  | `sqlite://shirizu.db?mode=rwc` |
    /// | `TRACKER_ENABLED`               | `true`                       |
    /// | `TRACKER_INTERVAL_HOURS`        | `4`                          |
    /// | `TRACKER_RETRY_BACKOFF_MINS`    | `30`                         |
    /// | `TRACKER_MAX_PARALLELISM`       | `3`                          |
    /// | `TRACKER_MAX_ATTEMPTS`          | `3`                          |
    /// | `TRACKER_BATCH_LIMIT`           | `5000`                       |
    /// | `TRACKER_HISTORY_NOTIFICATIONS` | `true`                       |
    /// | `SOURCE_BASE_URL`               | `http://localhost:8080`      |
    /// | `SOURCE_TIMEOUT_SECS`           | `30`                         |
    /// | `NOTIFY_WEBHOOK_URL`            | unset                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        Ok(Self {
            database_url: string("DATABASE_URL", "sqlite://shirizu.db?mode=rwc"),
            enabled: flag(&lookup, "TRACKER_ENABLED", true)?,
            interval_hours: number(&lookup, "TRACKER_INTERVAL_HOURS", CHECK_INTERVAL_HOURS)?,
            retry_backoff_mins: number(
                &lookup,
                "TRACKER_RETRY_BACKOFF_MINS",
                RETRY_BACKOFF_MINUTES,
            )?,
            max_parallelism: number(&lookup, "TRACKER_MAX_PARALLELISM", MAX_PARALLELISM)?,
            max_attempts: number(&lookup, "TRACKER_MAX_ATTEMPTS", MAX_ATTEMPTS)?,
            batch_limit: number(&lookup, "TRACKER_BATCH_LIMIT", DEFAULT_BATCH_LIMIT)?,
            history_notifications: flag(&lookup, "TRACKER_HISTORY_NOTIFICATIONS", true)?,
            source_base_url: string("SOURCE_BASE_URL", "http://localhost:8080"),
            source_timeout_secs: number(&lookup, "SOURCE_TIMEOUT_SECS", 30)?,
            webhook_url: lookup("NOTIFY_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
        })
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            enabled: self.enabled,
            max_parallelism: self.max_parallelism.max(1),
            max_attempts: self.max_attempts,
            batch_limit: self.batch_limit,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_secs(self.interval_hours.max(1).saturating_mul(3600)),
            retry_backoff: Duration::from_secs(self.retry_backoff_mins.saturating_mul(60)),
        }
    }
}

fn number<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError {
            name,
            value,
            expected: "number",
        }),
    }
}

fn flag<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            name,
            value,
            expected: "boolean",
        }),
    }
}
