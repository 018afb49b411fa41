//! Shared fixtures for worker integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shirizu_core::error::CheckError;
use shirizu_core::manga::{Manga, MangaChapter, MangaSource};
use shirizu_core::types::DbId;
use shirizu_db::repositories::{HistoryRepo, MangaRepo};
use shirizu_db::DbPool;
use shirizu_events::{EventBus, Notifier, NotifyError, UpdateNotification};
use shirizu_tracker::{
    CachePolicy, MangaRepository, RepositoryKind, SourceRegistry, Tracker, TrackingRepository,
};
use shirizu_worker::{TrackWorker, WorkerSettings};
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Fake source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<DbId, Result<Manga, CheckError>>>,
    /// One-off responses served before `responses`.
    queued: Mutex<HashMap<DbId, VecDeque<Result<Manga, CheckError>>>>,
    calls: Mutex<Vec<DbId>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    /// Fetches hold here until the test releases permits.
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Source whose fetches block until `gate` gets permits.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn set(&self, manga_id: DbId, response: Result<Manga, CheckError>) {
        self.responses.lock().unwrap().insert(manga_id, response);
    }

    /// Serve `response` once, before whatever [`set`](Self::set) configured.
    pub fn push(&self, manga_id: DbId, response: Result<Manga, CheckError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(manga_id)
            .or_default()
            .push_back(response);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Ids fetched so far, in call order.
    pub fn calls(&self) -> Vec<DbId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MangaRepository for FakeSource {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Remote
    }

    fn name(&self) -> &str {
        "FakeSource"
    }

    async fn get_details(&self, manga: &Manga, _cache: CachePolicy) -> Result<Manga, CheckError> {
        self.calls.lock().unwrap().push(manga.id);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&manga.id)
            .and_then(VecDeque::pop_front);
        let response = queued.or_else(|| self.responses.lock().unwrap().get(&manga.id).cloned());
        response.unwrap_or(Err(CheckError::NotFound))
    }
}

// ---------------------------------------------------------------------------
// Recording notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<UpdateNotification>>,
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub cancelled: AtomicUsize,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<UpdateNotification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn show_progress(&self, max: usize, progress: usize) {
        self.progress.lock().unwrap().push((max, progress));
    }

    fn cancel_progress(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }

    async fn notify_updates(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn chapter(id: DbId) -> MangaChapter {
    MangaChapter {
        id,
        name: format!("Chapter {id}"),
        number: id as f32,
        upload_date: None,
        branch: None,
    }
}

pub fn manga(id: DbId) -> Manga {
    Manga {
        id,
        title: format!("Manga {id}"),
        url: format!("/manga/{id}"),
        public_url: format!("https://example.org/manga/{id}"),
        cover_url: Some(format!("https://example.org/covers/{id}.jpg")),
        source: MangaSource::Parser("EXAMPLE".into()),
        is_nsfw: false,
        chapters: None,
    }
}

pub fn manga_with(id: DbId, chapter_ids: &[DbId]) -> Manga {
    Manga {
        chapters: Some(chapter_ids.iter().map(|&c| chapter(c)).collect()),
        ..manga(id)
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

pub struct TestEnv {
    pub pool: DbPool,
    pub store: Arc<TrackingRepository>,
    pub source: Arc<FakeSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub worker: Arc<TrackWorker>,
}

pub async fn setup() -> TestEnv {
    setup_with(FakeSource::default(), WorkerSettings::default()).await
}

pub async fn setup_with(source: FakeSource, settings: WorkerSettings) -> TestEnv {
    let pool = shirizu_db::create_memory_pool().await.unwrap();
    shirizu_db::run_migrations(&pool).await.unwrap();
    let store = Arc::new(TrackingRepository::new(pool.clone(), Arc::new(EventBus::default())));
    let source = Arc::new(source);
    let registry = Arc::new(SourceRegistry::new(source.clone()));
    let tracker = Arc::new(Tracker::new(store.clone(), registry, true));
    let notifier = Arc::new(RecordingNotifier::default());
    let worker = Arc::new(TrackWorker::new(
        tracker,
        notifier.clone(),
        pool.clone(),
        settings,
    ));
    TestEnv {
        pool,
        store,
        source,
        notifier,
        worker,
    }
}

/// Put `manga` into the reading history so it becomes tracked.
pub async fn add_to_history(pool: &DbPool, manga: &Manga) {
    MangaRepo::upsert(pool, manga).await.unwrap();
    HistoryRepo::upsert(pool, manga.id, 1, 0, 0.0).await.unwrap();
}
