//! Shared fixtures for tracker integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shirizu_core::error::CheckError;
use shirizu_core::manga::{Manga, MangaChapter, MangaSource};
use shirizu_core::types::DbId;
use shirizu_db::models::favourite::CreateCategory;
use shirizu_db::repositories::{FavouriteRepo, HistoryRepo, MangaRepo};
use shirizu_db::DbPool;
use shirizu_events::EventBus;
use shirizu_tracker::{
    CachePolicy, MangaRepository, RepositoryKind, SourceRegistry, Tracker, TrackingRepository,
};

// ---------------------------------------------------------------------------
// Fake source
// ---------------------------------------------------------------------------

/// Remote repository serving scripted details.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<DbId, Result<Manga, CheckError>>>,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set(&self, manga_id: DbId, response: Result<Manga, CheckError>) {
        self.responses.lock().unwrap().insert(manga_id, response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
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

    async fn get_details(&self, manga: &Manga, cache: CachePolicy) -> Result<Manga, CheckError> {
        assert_eq!(cache, CachePolicy::WriteOnly);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let response = self.responses.lock().unwrap().get(&manga.id).cloned();
        response.unwrap_or(Err(CheckError::NotFound))
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

/// Summary manga without chapters.
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

pub fn category(title: &str, track: bool, notifications: bool) -> CreateCategory {
    CreateCategory {
        title: title.to_string(),
        sort_key: None,
        track: Some(track),
        notifications: Some(notifications),
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

pub struct TestEnv {
    pub pool: DbPool,
    pub store: Arc<TrackingRepository>,
    pub source: Arc<FakeSource>,
    pub tracker: Arc<Tracker>,
}

pub async fn setup() -> TestEnv {
    setup_with(FakeSource::default(), true).await
}

pub async fn setup_with(source: FakeSource, history_notifications: bool) -> TestEnv {
    let pool = shirizu_db::create_memory_pool().await.unwrap();
    shirizu_db::run_migrations(&pool).await.unwrap();
    let store = Arc::new(TrackingRepository::new(pool.clone(), Arc::new(EventBus::default())));
    let source = Arc::new(source);
    let registry = Arc::new(SourceRegistry::new(source.clone()));
    let tracker = Arc::new(Tracker::new(store.clone(), registry, history_notifications));
    TestEnv {
        pool,
        store,
        source,
        tracker,
    }
}

/// Add a manga to the reading history, positioned at `chapter_id`.
pub async fn add_to_history(pool: &DbPool, manga_id: DbId, chapter_id: DbId, percent: f64) {
    MangaRepo::upsert(pool, &manga(manga_id)).await.unwrap();
    HistoryRepo::upsert(pool, manga_id, chapter_id, 0, percent)
        .await
        .unwrap();
}

/// Add a manga to a favourite category.
pub async fn add_to_favourites(pool: &DbPool, manga_id: DbId, category_id: DbId) {
    MangaRepo::upsert(pool, &manga(manga_id)).await.unwrap();
    FavouriteRepo::add(pool, manga_id, category_id).await.unwrap();
}
