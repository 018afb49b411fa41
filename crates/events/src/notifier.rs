//! Notification capability used by the update worker.
//!
//! The worker reports run progress and posts one [`UpdateNotification`] per
//! manga with new chapters. Where those end up is up to the [`Notifier`]
//! implementation.

use async_trait::async_trait;
use serde::Serialize;
use shirizu_core::channels::CHANNEL_WORKER;
use shirizu_core::tracking::UpdateCheck;
use shirizu_core::types::DbId;

use crate::delivery::webhook::WebhookError;

// ---------------------------------------------------------------------------
// UpdateNotification
// ---------------------------------------------------------------------------

/// Lock-screen visibility of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    /// Used for NSFW manga.
    Secret,
}

/// "New chapters" notification for a single manga.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateNotification {
    pub channel_id: String,
    /// Stable per-manga key; a newer notification replaces an older one.
    pub tag: String,
    pub manga_id: DbId,
    pub title: String,
    pub summary: String,
    /// One line per new chapter name.
    pub lines: Vec<String>,
    pub number: usize,
    pub cover_url: Option<String>,
    pub source: String,
    pub visibility: Visibility,
}

impl UpdateNotification {
    /// Build the notification for a completed check.
    ///
    /// Returns `None` unless the check is valid, has new chapters and was
    /// assigned a channel.
    pub fn from_check(check: &UpdateCheck) -> Option<Self> {
        if !check.is_notifiable() {
            return None;
        }
        let channel_id = check.channel_id.clone()?;
        let manga = &check.manga;
        let number = check.new_chapters.len();
        Some(Self {
            channel_id,
            tag: manga.url.clone(),
            manga_id: manga.id,
            title: manga.title.clone(),
            summary: new_chapters_summary(number),
            lines: check.new_chapters.iter().map(|c| c.name.clone()).collect(),
            number,
            cover_url: manga.cover_url.clone(),
            source: manga.source.to_string(),
            visibility: if manga.is_nsfw {
                Visibility::Secret
            } else {
                Visibility::Public
            },
        })
    }
}

fn new_chapters_summary(count: usize) -> String {
    if count == 1 {
        "1 new chapter".to_string()
    } else {
        format!("{count} new chapters")
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Error returned when a notification could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Surface for worker progress and update notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report that `progress` of `max` manga have been checked.
    fn show_progress(&self, max: usize, progress: usize);

    /// Remove the progress indicator. Called once at the end of every run.
    fn cancel_progress(&self);

    async fn notify_updates(&self, notification: &UpdateNotification) -> Result<(), NotifyError>;
}

/// Notifier that writes everything to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn show_progress(&self, max: usize, progress: usize) {
        tracing::debug!(channel_id = CHANNEL_WORKER, progress, max, "Checking for new chapters");
    }

    fn cancel_progress(&self) {
        tracing::debug!(channel_id = CHANNEL_WORKER, "Update check finished");
    }

    async fn notify_updates(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        tracing::info!(
            channel_id = %notification.channel_id,
            manga_id = notification.manga_id,
            title = %notification.title,
            summary = %notification.summary,
            chapters = ?notification.lines,
            "New chapters"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
