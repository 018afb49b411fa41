//! One pass of the background update check.
//!
//! [`TrackWorker::do_work`] picks the batch (the retry set if the previous
//! run left one, otherwise the least recently checked tracked manga), checks
//! it with bounded parallelism, notifies about new chapters and decides
//! whether the scheduler should retry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use shirizu_core::error::CheckError;
use shirizu_core::tracking::{MangaUpdates, TrackingItem, MAX_ATTEMPTS, MAX_PARALLELISM};
use shirizu_core::types::DbId;
use shirizu_db::DbPool;
use shirizu_events::{Notifier, UpdateNotification};
use shirizu_tracker::Tracker;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::WorkerError;
use crate::retry;

/// Default upper bound on manga checked by one full run.
pub const DEFAULT_BATCH_LIMIT: i64 = 5000;

// ---------------------------------------------------------------------------
// Settings / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub max_parallelism: usize,
    /// Runs with an attempt number above this give up on retrying.
    pub max_attempts: u32,
    pub batch_limit: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_parallelism: MAX_PARALLELISM,
            max_attempts: MAX_ATTEMPTS,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Number of successful and failed checks of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub success: usize,
    pub failed: usize,
}

/// What the scheduler should do after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success(RunSummary),
    /// Every check failed (or the run itself did).
    Failure(RunSummary),
    /// Some checks failed with retryable errors; run again after a backoff.
    Retry(RunSummary),
}

impl WorkOutcome {
    pub fn summary(&self) -> RunSummary {
        match self {
            Self::Success(s) | Self::Failure(s) | Self::Retry(s) => *s,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackWorker
// ---------------------------------------------------------------------------

pub struct TrackWorker {
    tracker: Arc<Tracker>,
    notifier: Arc<dyn Notifier>,
    pool: DbPool,
    settings: WorkerSettings,
}

impl TrackWorker {
    pub fn new(
        tracker: Arc<Tracker>,
        notifier: Arc<dyn Notifier>,
        pool: DbPool,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            tracker,
            notifier,
            pool,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Run one update check. `attempt` is 0 for a fresh run and counts up
    /// across retries.
    ///
    /// Never fails: errors outside the per-manga checks are logged and
    /// reported as [`WorkOutcome::Failure`].
    pub async fn do_work(&self, attempt: u32) -> WorkOutcome {
        tracing::debug!(attempt, "Update check started");
        let _progress = ProgressGuard(self.notifier.as_ref());
        match self.run(attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(attempt, error = %e, "Update check run failed");
                WorkOutcome::Failure(RunSummary::default())
            }
        }
    }

    async fn run(&self, attempt: u32) -> Result<WorkOutcome, WorkerError> {
        if !self.settings.enabled {
            return Ok(WorkOutcome::Success(RunSummary::default()));
        }

        let retry_ids = retry::load(&self.pool).await?;
        let batch = if retry_ids.is_empty() {
            self.tracker.get_tracks(self.settings.batch_limit).await?
        } else {
            let ids: Vec<DbId> = retry_ids.iter().copied().collect();
            self.tracker.get_tracks_by_ids(&ids).await?
        };
        tracing::info!(
            attempt,
            total = batch.len(),
            retry = !retry_ids.is_empty(),
            "Checking tracked manga"
        );
        if batch.is_empty() {
            if !retry_ids.is_empty() {
                // Everything left to retry is no longer tracked.
                retry::store(&self.pool, &BTreeSet::new()).await?;
            }
            return Ok(WorkOutcome::Success(RunSummary::default()));
        }

        let results = self.check_all(batch).await;
        self.tracker.gc().await?;

        let (summary, mut retry_ids) = tally(&results);
        if attempt > self.settings.max_attempts {
            retry_ids.clear();
        }
        retry::store(&self.pool, &retry_ids).await?;
        tracing::info!(
            success = summary.success,
            failed = summary.failed,
            retry = retry_ids.len(),
            "Update check finished"
        );

        Ok(if !retry_ids.is_empty() {
            WorkOutcome::Retry(summary)
        } else if summary.success == 0 && summary.failed != 0 {
            WorkOutcome::Failure(summary)
        } else {
            WorkOutcome::Success(summary)
        })
    }

    /// Check every item, at most `max_parallelism` at a time. Returns one
    /// result per item, in completion order.
    async fn check_all(&self, batch: Vec<TrackingItem>) -> Vec<MangaUpdates> {
        let total = batch.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallelism.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);

        for item in batch {
            let manga = item.tracking.manga.clone();
            let tracker = Arc::clone(&self.tracker);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return MangaUpdates::failure(
                        item.tracking.manga,
                        CheckError::Aborted("semaphore closed".into()),
                    );
                };
                check_one(&tracker, item).await
            });
            pending.insert(handle.id(), manga);
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next_with_id().await {
            let updates = match joined {
                Ok((id, updates)) => {
                    pending.remove(&id);
                    updates
                }
                Err(e) => {
                    let Some(manga) = pending.remove(&e.id()) else {
                        tracing::error!(error = %e, "Unknown update check task ended");
                        continue;
                    };
                    tracing::error!(manga_id = manga.id, error = %e, "Update check task died");
                    MangaUpdates::failure(manga, CheckError::Aborted(e.to_string()))
                }
            };
            self.notifier.show_progress(total, results.len() + 1);
            self.report(&updates).await;
            results.push(updates);
        }
        results
    }

    async fn report(&self, updates: &MangaUpdates) {
        match updates {
            MangaUpdates::Failure(failure) => {
                if let CheckError::CloudflareProtected { url } = &failure.error {
                    tracing::warn!(manga_id = failure.manga.id, url = %url, "Blocked by Cloudflare");
                }
            }
            MangaUpdates::Success(check) => {
                let Some(notification) = UpdateNotification::from_check(check) else {
                    return;
                };
                if let Err(e) = self.notifier.notify_updates(&notification).await {
                    tracing::warn!(
                        manga_id = notification.manga_id,
                        error = %e,
                        "Failed to deliver update notification"
                    );
                }
            }
        }
    }
}

async fn check_one(tracker: &Tracker, item: TrackingItem) -> MangaUpdates {
    let TrackingItem {
        tracking,
        channel_id,
    } = item;
    match tracker.fetch_updates(&tracking, true).await {
        Ok(updates) => updates.with_channel(channel_id),
        Err(e) => {
            tracing::warn!(manga_id = tracking.manga.id, error = %e, "Failed to save update check");
            MangaUpdates::failure(tracking.manga, CheckError::Storage(e.to_string()))
        }
    }
}

/// Count successes and failures, and collect the ids worth retrying.
fn tally(results: &[MangaUpdates]) -> (RunSummary, BTreeSet<DbId>) {
    let mut summary = RunSummary::default();
    let mut retry = BTreeSet::new();
    for updates in results {
        match updates {
            MangaUpdates::Success(_) => summary.success += 1,
            MangaUpdates::Failure(failure) => {
                summary.failed += 1;
                if failure.should_retry() {
                    retry.insert(failure.manga.id);
                }
            }
        }
    }
    (summary, retry)
}

/// Cancels the progress indicator when a run ends, however it ends.
struct ProgressGuard<'a>(&'a dyn Notifier);

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.cancel_progress();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use shirizu_core::manga::{Manga, MangaSource};
    use shirizu_core::tracking::UpdateCheck;

    use super::*;

    fn manga(id: DbId) -> Manga {
        Manga {
            id,
            title: format!("Manga {id}"),
            url: format!("/manga/{id}"),
            public_url: format!("https://example.org/manga/{id}"),
            cover_url: None,
            source: MangaSource::Parser("EXAMPLE".into()),
            is_nsfw: false,
            chapters: Some(Vec::new()),
        }
    }

    fn success(id: DbId) -> MangaUpdates {
        MangaUpdates::Success(UpdateCheck {
            manga: manga(id),
            new_chapters: Vec::new(),
            is_valid: true,
            channel_id: None,
        })
    }

    #[test]
    fn tally_counts_and_collects_retryable_failures() {
        let results = vec![
            success(1),
            MangaUpdates::failure(manga(2), CheckError::Timeout),
            MangaUpdates::failure(manga(3), CheckError::NotFound),
            MangaUpdates::failure(
                manga(4),
                CheckError::CloudflareProtected {
                    url: "https://example.org".into(),
                },
            ),
            success(5),
        ];
        let (summary, retry) = tally(&results);
        assert_eq!(summary, RunSummary { success: 2, failed: 3 });
        assert_eq!(retry, BTreeSet::from([2, 4]));
    }

    #[test]
    fn tally_of_nothing() {
        let (summary, retry) = tally(&[]);
        assert_eq!(summary, RunSummary::default());
        assert!(retry.is_empty());
    }

    #[test]
    fn outcome_exposes_summary() {
        let summary = RunSummary { success: 1, failed: 2 };
        assert_eq!(WorkOutcome::Retry(summary).summary(), summary);
    }
}
