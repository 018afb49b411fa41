//! Tracking store.
//!
//! [`TrackingRepository`] owns the `tracks` and `track_logs` tables. Every
//! multi-statement operation runs in one transaction, and every mutation is
//! announced on the [`EventBus`] so that the `observe_*` streams can emit
//! fresh values.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, Stream};
use shirizu_core::manga::Manga;
use shirizu_core::tracking::{MangaTracking, MangaUpdates, UpdateCheck, MAX_LOG_SIZE};
use shirizu_core::types::DbId;
use shirizu_db::models::favourite::FavouriteCategory;
use shirizu_db::models::track::Track;
use shirizu_db::models::track_log::{join_chapters, TrackingLogItem};
use shirizu_db::repositories::{FavouriteRepo, HistoryRepo, MangaRepo, TrackLogRepo, TrackRepo};
use shirizu_db::DbPool;
use shirizu_events::{EventBus, TrackingEvent, TrackingEventKind};
use sqlx::SqliteConnection;
use tokio::sync::broadcast::error::RecvError;

pub struct TrackingRepository {
    pool: DbPool,
    bus: Arc<EventBus>,
    gc_called: AtomicBool,
}

impl TrackingRepository {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            bus,
            gc_called: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Tracked set
    // -----------------------------------------------------------------------

    /// Reconcile `tracks` with the tracked set (history plus tracking-enabled
    /// favourites): missing rows are created, rows outside the set deleted.
    ///
    /// Returns the number of pre-existing rows that stayed tracked.
    pub async fn update_tracks(&self) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        TrackRepo::gc(&mut *tx).await?;
        let mut unused: HashSet<DbId> = TrackRepo::find_all_ids(&mut *tx).await?.into_iter().collect();
        let size = unused.len() as i64;

        let mut tracked = HistoryRepo::find_all_ids(&mut *tx).await?;
        tracked.extend(FavouriteRepo::find_ids_with_track(&mut *tx).await?);
        let mut seen = HashSet::with_capacity(tracked.len());
        let mut created = 0;
        for manga_id in tracked {
            // A manga can be both in the history and in a favourite category.
            if !seen.insert(manga_id) {
                continue;
            }
            if !unused.remove(&manga_id) {
                TrackRepo::upsert(&mut *tx, &Track::create(manga_id)).await?;
                created += 1;
            }
        }

        for manga_id in &unused {
            TrackRepo::delete(&mut *tx, *manga_id).await?;
        }

        tx.commit().await?;

        tracing::debug!(created, removed = unused.len(), "Tracked set resolved");
        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::TracksResolved));
        Ok(size - unused.len() as i64)
    }

    // -----------------------------------------------------------------------
    // Cursors
    // -----------------------------------------------------------------------

    /// Cursors ordered by last check time, never-checked first.
    pub async fn get_tracks(&self, offset: i64, limit: i64) -> Result<Vec<MangaTracking>, sqlx::Error> {
        let rows = TrackRepo::find_page(&self.pool, offset, limit).await?;
        Ok(rows.into_iter().map(|r| r.into_tracking()).collect())
    }

    /// Cursors of the given manga, in check order. Untracked ids are skipped.
    pub async fn get_tracks_by_ids(&self, ids: &[DbId]) -> Result<Vec<MangaTracking>, sqlx::Error> {
        let rows = TrackRepo::find_by_ids(&self.pool, ids).await?;
        Ok(rows.into_iter().map(|r| r.into_tracking()).collect())
    }

    /// Cursor of `manga`; an empty cursor if it has never been tracked.
    pub async fn get_track(&self, manga: &Manga) -> Result<MangaTracking, sqlx::Error> {
        let track = TrackRepo::find(&self.pool, manga.id).await?;
        Ok(match track {
            Some(t) => MangaTracking {
                manga: manga.clone(),
                last_chapter_id: t.last_chapter_id,
                last_check: t.last_check_time,
            },
            None => MangaTracking::empty(manga.clone()),
        })
    }

    /// `track` with its cursor replaced by the stored one, if there is one.
    pub async fn refresh_cursor(&self, track: &MangaTracking) -> Result<MangaTracking, sqlx::Error> {
        Ok(match TrackRepo::find(&self.pool, track.manga.id).await? {
            Some(t) => MangaTracking {
                manga: track.manga.clone(),
                last_chapter_id: t.last_chapter_id,
                last_check: t.last_check_time,
            },
            None => track.clone(),
        })
    }

    /// First tracking-enabled favourite category containing the manga.
    pub async fn tracking_category(
        &self,
        manga_id: DbId,
    ) -> Result<Option<FavouriteCategory>, sqlx::Error> {
        let categories = FavouriteRepo::find_categories_with_track(&self.pool, manga_id).await?;
        Ok(categories.into_iter().next())
    }

    /// Chapter the user last read, if the manga is in the history.
    pub async fn history_chapter(&self, manga_id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        Ok(HistoryRepo::find(&self.pool, manga_id)
            .await?
            .map(|h| h.chapter_id))
    }

    pub async fn delete_track(&self, manga_id: DbId) -> Result<bool, sqlx::Error> {
        let deleted = TrackRepo::delete(&self.pool, manga_id).await?;
        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::TrackDeleted).with_manga(manga_id));
        Ok(deleted)
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Merge a check result into the manga's cursor.
    ///
    /// A valid result with new chapters also rescales the reading progress
    /// and appends an update log entry, in the same transaction.
    pub async fn save_updates(&self, updates: &MangaUpdates) -> Result<(), sqlx::Error> {
        let manga = updates.manga();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        MangaRepo::upsert(&mut *tx, manga).await?;
        let track = TrackRepo::find(&mut *tx, manga.id)
            .await?
            .unwrap_or_else(|| Track::create(manga.id));
        TrackRepo::upsert(&mut *tx, &track.merge_with(updates, now)).await?;

        if let MangaUpdates::Success(check) = updates {
            if check.is_notifiable() {
                update_percent(&mut tx, check).await?;
                let names: Vec<String> = check.new_chapters.iter().map(|c| c.name.clone()).collect();
                TrackLogRepo::insert(&mut *tx, manga.id, &join_chapters(&names), now).await?;
            }
        }

        tx.commit().await?;

        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::UpdatesSaved).with_manga(manga.id));
        Ok(())
    }

    /// Move the cursor of `manga` to match a chapter the user just read.
    ///
    /// No-op when `manga` carries no chapter list.
    pub async fn sync_with_history(&self, manga: &Manga, chapter_id: DbId) -> Result<(), sqlx::Error> {
        if manga.chapters.is_none() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        MangaRepo::upsert(&mut *tx, manga).await?;
        let track = TrackRepo::find(&mut *tx, manga.id)
            .await?
            .unwrap_or_else(|| Track::create(manga.id));
        if let Some(synced) = track.synced_with_reading(manga, chapter_id, Utc::now()) {
            TrackRepo::upsert(&mut *tx, &synced).await?;
        }

        tx.commit().await?;

        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::ReadingSynced).with_manga(manga.id));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Acknowledgement
    // -----------------------------------------------------------------------

    /// Reset the unseen counters of `ids`.
    pub async fn clear_updates(&self, ids: &[DbId]) -> Result<(), sqlx::Error> {
        match ids {
            [] => return Ok(()),
            [id] => TrackRepo::clear_counter(&self.pool, *id).await?,
            _ => {
                let mut tx = self.pool.begin().await?;
                for id in ids {
                    TrackRepo::clear_counter(&mut *tx, *id).await?;
                }
                tx.commit().await?;
            }
        }
        self.bus.publish(
            TrackingEvent::new(TrackingEventKind::CountersCleared).with_mangas(ids.iter().copied()),
        );
        Ok(())
    }

    /// Reset every unseen counter.
    pub async fn clear_counters(&self) -> Result<(), sqlx::Error> {
        TrackRepo::clear_counters(&self.pool).await?;
        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::CountersCleared));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Garbage collection
    // -----------------------------------------------------------------------

    /// Drop untracked cursors and their log entries, then trim the log.
    pub async fn gc(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let tracks = TrackRepo::gc(&mut *tx).await?;
        let logs = TrackLogRepo::gc(&mut *tx).await?;
        let trimmed = TrackLogRepo::trim(&mut *tx, MAX_LOG_SIZE).await?;
        tx.commit().await?;

        tracing::debug!(tracks, logs, trimmed, "Tracking GC finished");
        self.bus
            .publish(TrackingEvent::new(TrackingEventKind::GarbageCollected));
        Ok(())
    }

    /// Run [`gc`](Self::gc) once per store instance.
    pub async fn gc_if_not_called(&self) -> Result<(), sqlx::Error> {
        if self.gc_called.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.gc().await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_new_chapters_count(&self, manga_id: DbId) -> Result<i32, sqlx::Error> {
        Ok(TrackRepo::find_new_chapters(&self.pool, manga_id)
            .await?
            .unwrap_or(0))
    }

    /// Number of manga with unseen chapters.
    pub async fn updated_manga_count(&self) -> Result<i64, sqlx::Error> {
        TrackRepo::count_updated(&self.pool).await
    }

    /// Manga with unseen chapters, most unseen first.
    pub async fn updated_manga(&self, limit: Option<i64>) -> Result<Vec<Manga>, sqlx::Error> {
        let rows = TrackRepo::find_updated_manga(&self.pool, limit).await?;
        Ok(rows.into_iter().map(|r| r.into_manga()).collect())
    }

    /// Newest update log entries, flagged as new while they fall within the
    /// manga's unseen counter.
    pub async fn tracking_log(&self, limit: i64) -> Result<Vec<TrackingLogItem>, sqlx::Error> {
        let mut counters: HashMap<DbId, i64> = TrackRepo::new_chapters_map(&self.pool)
            .await?
            .into_iter()
            .collect();
        let rows = TrackLogRepo::list(&self.pool, limit).await?;
        Ok(rows
            .into_iter()
            .map(|r| r.into_item(&mut counters))
            .collect())
    }

    pub async fn logs_count(&self) -> Result<i64, sqlx::Error> {
        TrackLogRepo::count(&self.pool).await
    }

    pub async fn clear_logs(&self) -> Result<(), sqlx::Error> {
        TrackLogRepo::clear(&self.pool).await?;
        self.bus.publish(TrackingEvent::new(TrackingEventKind::LogsCleared));
        Ok(())
    }

    /// `(tracking_enabled, total)` favourite category counts.
    pub async fn categories_count(&self) -> Result<(usize, usize), sqlx::Error> {
        let categories = FavouriteRepo::list_categories(&self.pool).await?;
        let tracked = categories.iter().filter(|c| c.track).count();
        Ok((tracked, categories.len()))
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Number of manga with unseen chapters, re-emitted when it changes.
    pub fn observe_updated_manga_count(
        self: &Arc<Self>,
    ) -> impl Stream<Item = Result<i64, sqlx::Error>> + Send + 'static {
        self.observe(true, |_| true, |store| async move {
            store.updated_manga_count().await
        })
    }

    /// Unseen counter of one manga, re-emitted when it changes.
    pub fn observe_new_chapters_count(
        self: &Arc<Self>,
        manga_id: DbId,
    ) -> impl Stream<Item = Result<i32, sqlx::Error>> + Send + 'static {
        self.observe(
            false,
            move |event| event.touches(manga_id),
            move |store| async move { store.get_new_chapters_count(manga_id).await },
        )
    }

    /// Manga with unseen chapters, re-emitted when the list changes.
    pub fn observe_updated_manga(
        self: &Arc<Self>,
        limit: Option<i64>,
    ) -> impl Stream<Item = Result<Vec<Manga>, sqlx::Error>> + Send + 'static {
        self.observe(true, |_| true, move |store| async move {
            store.updated_manga(limit).await
        })
    }

    /// Update log, re-emitted when it changes.
    pub fn observe_tracking_log(
        self: &Arc<Self>,
        limit: i64,
    ) -> impl Stream<Item = Result<Vec<TrackingLogItem>, sqlx::Error>> + Send + 'static {
        self.observe(true, |_| true, move |store| async move {
            store.tracking_log(limit).await
        })
    }

    /// Emit `read` now, then again after every relevant store event whose
    /// re-read yields a different value.
    ///
    /// The bus subscription is taken before the first read so no mutation
    /// in between is missed.
    fn observe<T, R, F, Fut>(
        self: &Arc<Self>,
        run_gc: bool,
        relevant: R,
        read: F,
    ) -> impl Stream<Item = Result<T, sqlx::Error>> + Send + 'static
    where
        T: PartialEq + Clone + Send + 'static,
        R: Fn(&TrackingEvent) -> bool + Send + 'static,
        F: Fn(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send + 'static,
    {
        let state = Observation {
            store: Arc::clone(self),
            events: self.bus.subscribe(),
            relevant,
            read,
            last: None,
            started: false,
            run_gc,
        };
        stream::unfold(state, |mut state| async move {
            let item = state.next().await?;
            Some((item, state))
        })
    }
}

/// State of one `observe_*` stream.
struct Observation<T, R, F> {
    store: Arc<TrackingRepository>,
    events: tokio::sync::broadcast::Receiver<TrackingEvent>,
    relevant: R,
    read: F,
    last: Option<T>,
    started: bool,
    run_gc: bool,
}

impl<T, R, F, Fut> Observation<T, R, F>
where
    T: PartialEq + Clone,
    R: Fn(&TrackingEvent) -> bool,
    F: Fn(Arc<TrackingRepository>) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    /// Next item, or `None` once the bus is gone.
    async fn next(&mut self) -> Option<Result<T, sqlx::Error>> {
        if !self.started {
            self.started = true;
            if self.run_gc {
                if let Err(e) = self.store.gc_if_not_called().await {
                    return Some(Err(e));
                }
            }
            return Some(self.read_changed(true).await?);
        }
        loop {
            match self.events.recv().await {
                Ok(event) if !(self.relevant)(&event) => continue,
                // A lagged receiver missed events; re-read to catch up.
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
            if let Some(item) = self.read_changed(false).await {
                return Some(item);
            }
        }
    }

    /// Read the value; `None` when unchanged since the last emission.
    async fn read_changed(&mut self, force: bool) -> Option<Result<T, sqlx::Error>> {
        match (self.read)(Arc::clone(&self.store)).await {
            Ok(value) if !force && self.last.as_ref() == Some(&value) => None,
            Ok(value) => {
                self.last = Some(value.clone());
                Some(Ok(value))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Rescale the reading progress after chapters were appended.
///
/// Applies only when the manga is in the history and its history chapter is
/// part of the fetched list.
async fn update_percent(conn: &mut SqliteConnection, check: &UpdateCheck) -> Result<(), sqlx::Error> {
    let Some(history) = HistoryRepo::find(&mut *conn, check.manga.id).await? else {
        return Ok(());
    };
    let Some(chapters) = check.manga.chapters.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(());
    };
    if !chapters.iter().any(|c| c.id == history.chapter_id) {
        return Ok(());
    }
    let total = chapters.len() as f64;
    let position = (total - check.new_chapters.len() as f64) * history.percent;
    HistoryRepo::update_percent(&mut *conn, check.manga.id, position / total).await
}
