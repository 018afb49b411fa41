//! The update tracker.
//!
//! [`Tracker`] builds the batch of manga to check, and checks one manga at a
//! time: fetch fresh details, pick the branch to compare, diff against the
//! stored cursor and commit. All work on one manga runs under a per-manga
//! lock, so a manual check and the background worker never interleave.

use std::sync::Arc;

use shirizu_core::branch::preferred_branch;
use shirizu_core::channels::{favourites_channel_id, CHANNEL_HISTORY};
use shirizu_core::diff::compare;
use shirizu_core::error::CheckError;
use shirizu_core::keyed_mutex::KeyedMutex;
use shirizu_core::manga::Manga;
use shirizu_core::tracking::{MangaTracking, MangaUpdates, TrackingItem, UpdateCheck};
use shirizu_core::types::DbId;

use crate::error::TrackerError;
use crate::source::{CachePolicy, MangaRepositoryFactory, RepositoryKind};
use crate::store::TrackingRepository;

pub struct Tracker {
    store: Arc<TrackingRepository>,
    sources: Arc<dyn MangaRepositoryFactory>,
    /// Post notifications for manga tracked only through the history.
    history_notifications: bool,
    manga_lock: KeyedMutex<DbId>,
}

impl Tracker {
    pub fn new(
        store: Arc<TrackingRepository>,
        sources: Arc<dyn MangaRepositoryFactory>,
        history_notifications: bool,
    ) -> Self {
        Self {
            store,
            sources,
            history_notifications,
            manga_lock: KeyedMutex::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Resolve the tracked set and return up to `limit` of its least
    /// recently checked manga, each with its notification channel.
    pub async fn get_tracks(&self, limit: i64) -> Result<Vec<TrackingItem>, TrackerError> {
        self.store.update_tracks().await?;
        let cursors = self.store.get_tracks(0, limit).await?;
        self.with_channels(cursors).await
    }

    /// Items for an explicit set of manga (retry runs).
    pub async fn get_tracks_by_ids(&self, ids: &[DbId]) -> Result<Vec<TrackingItem>, TrackerError> {
        let cursors = self.store.get_tracks_by_ids(ids).await?;
        self.with_channels(cursors).await
    }

    async fn with_channels(
        &self,
        cursors: Vec<MangaTracking>,
    ) -> Result<Vec<TrackingItem>, TrackerError> {
        let mut items = Vec::with_capacity(cursors.len());
        for tracking in cursors {
            let channel_id = self.channel_for(tracking.manga.id).await?;
            items.push(TrackingItem {
                tracking,
                channel_id,
            });
        }
        Ok(items)
    }

    /// Favourites channel of the first tracked category holding the manga,
    /// else the history channel. `None` when that channel is muted.
    async fn channel_for(&self, manga_id: DbId) -> Result<Option<String>, sqlx::Error> {
        Ok(match self.store.tracking_category(manga_id).await? {
            Some(category) if category.notifications => {
                Some(favourites_channel_id(category.category_id))
            }
            Some(_) => None,
            None if self.history_notifications => Some(CHANNEL_HISTORY.to_string()),
            None => None,
        })
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    /// Check one manga for new chapters.
    ///
    /// Anything that goes wrong while fetching or comparing is reported as
    /// [`MangaUpdates::Failure`]. With `commit`, the result is saved; a
    /// failure to save is returned as an error.
    pub async fn fetch_updates(
        &self,
        track: &MangaTracking,
        commit: bool,
    ) -> Result<MangaUpdates, TrackerError> {
        let manga_id = track.manga.id;
        let _guard = self.manga_lock.lock(manga_id).await;
        // The batch snapshot may predate a check that committed while we waited.
        let track = self.store.refresh_cursor(track).await?;

        let updates = match self.fetch_and_compare(&track).await {
            Ok(check) => MangaUpdates::Success(check),
            Err(error) => {
                tracing::debug!(manga_id, error = %error, "Update check failed");
                MangaUpdates::failure(track.manga.clone(), error)
            }
        };
        if commit {
            self.store.save_updates(&updates).await?;
        }
        Ok(updates)
    }

    async fn fetch_and_compare(&self, track: &MangaTracking) -> Result<UpdateCheck, CheckError> {
        let repository = self.sources.create(&track.manga.source);
        if repository.kind() != RepositoryKind::Remote {
            return Err(CheckError::UnsupportedSource(repository.name().to_string()));
        }
        let manga = repository
            .get_details(&track.manga, CachePolicy::WriteOnly)
            .await?;
        let branch = self
            .branch_for(&manga)
            .await
            .map_err(|e| CheckError::Storage(e.to_string()))?;
        compare(track, manga, branch.as_deref())
    }

    /// Compare already fetched details against the stored cursor.
    pub async fn check_updates(&self, manga: Manga, commit: bool) -> Result<UpdateCheck, TrackerError> {
        let _guard = self.manga_lock.lock(manga.id).await;

        let track = self.store.get_track(&manga).await?;
        let branch = self.branch_for(&manga).await?;
        let check = compare(&track, manga, branch.as_deref())?;
        if commit {
            self.store
                .save_updates(&MangaUpdates::Success(check.clone()))
                .await?;
        }
        Ok(check)
    }

    pub async fn delete_track(&self, manga_id: DbId) -> Result<bool, TrackerError> {
        let _guard = self.manga_lock.lock(manga_id).await;
        Ok(self.store.delete_track(manga_id).await?)
    }

    pub async fn gc(&self) -> Result<(), TrackerError> {
        Ok(self.store.gc().await?)
    }

    async fn branch_for(&self, manga: &Manga) -> Result<Option<String>, sqlx::Error> {
        let history_chapter = self.store.history_chapter(manga.id).await?;
        Ok(preferred_branch(manga, history_chapter))
    }
}
