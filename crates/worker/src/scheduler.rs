//! When update checks run.
//!
//! [`TrackScheduler`] owns a periodic loop (every `interval`, first run right
//! away) and can also start one-shot runs. A run that asks for a retry is
//! repeated after a linear backoff until it stops asking. Runs never
//! overlap. The loop exits when the shutdown [`CancellationToken`] is
//! cancelled or the schedule is removed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use shirizu_core::tracking::{CHECK_INTERVAL_HOURS, RETRY_BACKOFF_MINUTES};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::track_worker::{TrackWorker, WorkOutcome};

/// Longest delay before a retry, however many attempts failed.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    /// Retry `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(CHECK_INTERVAL_HOURS * 3600),
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_MINUTES * 60),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(step: Duration, attempt: u32) -> Duration {
    step.saturating_mul(attempt.max(1)).min(MAX_BACKOFF)
}

// ---------------------------------------------------------------------------
// TrackScheduler
// ---------------------------------------------------------------------------

pub struct TrackScheduler {
    runner: Arc<Runner>,
    settings: SchedulerSettings,
    shutdown: CancellationToken,
    periodic: Mutex<Option<Periodic>>,
}

struct Periodic {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrackScheduler {
    pub fn new(
        worker: Arc<TrackWorker>,
        settings: SchedulerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            runner: Arc::new(Runner {
                worker,
                run_lock: tokio::sync::Mutex::new(()),
                running,
            }),
            settings,
            shutdown,
            periodic: Mutex::new(None),
        }
    }

    /// Start the periodic loop, replacing one that is already scheduled.
    pub fn schedule(&self) {
        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(Arc::clone(&self.runner).run_periodic(self.settings, cancel.clone()));
        if let Some(previous) = self.periodic().replace(Periodic { cancel, handle }) {
            previous.cancel.cancel();
        }
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            backoff_secs = self.settings.retry_backoff.as_secs(),
            "Update checks scheduled"
        );
    }

    /// Stop the periodic loop and wait for it to wind down. A run in
    /// progress is cancelled.
    pub async fn unschedule(&self) {
        let Some(periodic) = self.periodic().take() else {
            return;
        };
        periodic.cancel.cancel();
        if let Err(e) = periodic.handle.await {
            tracing::error!(error = %e, "Update check loop ended abnormally");
        }
        tracing::info!("Update checks unscheduled");
    }

    pub fn is_scheduled(&self) -> bool {
        self.periodic()
            .as_ref()
            .is_some_and(|p| !p.cancel.is_cancelled() && !p.handle.is_finished())
    }

    /// Run a check now, outside the periodic schedule.
    ///
    /// Waits for a run already in progress. A run asking for a retry is
    /// repeated with backoff, like a periodic one. Resolves to the last
    /// outcome, or `None` if shut down first.
    pub fn start_now(&self) -> JoinHandle<Option<WorkOutcome>> {
        let runner = Arc::clone(&self.runner);
        let settings = self.settings;
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move { runner.run_with_retries(settings, &cancel).await })
    }

    /// `true` while a run (periodic or one-shot) is in progress.
    pub fn observe_is_running(&self) -> watch::Receiver<bool> {
        self.runner.running.subscribe()
    }

    fn periodic(&self) -> MutexGuard<'_, Option<Periodic>> {
        self.periodic.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

struct Runner {
    worker: Arc<TrackWorker>,
    run_lock: tokio::sync::Mutex<()>,
    running: watch::Sender<bool>,
}

impl Runner {
    async fn run_once(&self, attempt: u32) -> WorkOutcome {
        let _serial = self.run_lock.lock().await;
        self.running.send_replace(true);
        let _running = RunningGuard(&self.running);
        self.worker.do_work(attempt).await
    }

    async fn run_periodic(self: Arc<Self>, settings: SchedulerSettings, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Update check loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.run_with_retries(settings, &cancel).await.is_none() {
                        break;
                    }
                }
            }
        }
    }

    /// Run until the worker stops asking for a retry and return the final
    /// outcome. `None` when cancelled.
    async fn run_with_retries(
        &self,
        settings: SchedulerSettings,
        cancel: &CancellationToken,
    ) -> Option<WorkOutcome> {
        let mut attempt = 0;
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return None,
                outcome = self.run_once(attempt) => outcome,
            };
            let WorkOutcome::Retry(summary) = outcome else {
                tracing::debug!(attempt, ?outcome, "Update check done");
                return Some(outcome);
            };

            attempt += 1;
            let delay = backoff_delay(settings.retry_backoff, attempt);
            tracing::info!(
                attempt,
                failed = summary.failed,
                delay_secs = delay.as_secs(),
                "Retrying update check"
            );
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Clears the running flag when a run ends or is cancelled.
struct RunningGuard<'a>(&'a watch::Sender<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear() {
        let step = Duration::from_secs(30 * 60);
        assert_eq!(backoff_delay(step, 1), Duration::from_secs(30 * 60));
        assert_eq!(backoff_delay(step, 2), Duration::from_secs(60 * 60));
        assert_eq!(backoff_delay(step, 3), Duration::from_secs(90 * 60));
    }

    #[test]
    fn backoff_is_capped() {
        let step = Duration::from_secs(30 * 60);
        assert_eq!(backoff_delay(step, 100), MAX_BACKOFF);
        assert_eq!(backoff_delay(step, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn attempt_zero_waits_one_step() {
        let step = Duration::from_secs(60);
        assert_eq!(backoff_delay(step, 0), step);
    }

    #[test]
    fn default_settings() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(4 * 3600));
        assert_eq!(settings.retry_backoff, Duration::from_secs(1800));
    }
}
