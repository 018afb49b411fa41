//! HTTP client for a manga details service.
//!
//! [`HttpMangaRepository`] fetches `GET {base_url}/manga/{id}` and decodes
//! the JSON body as a [`Manga`]. Transport and status failures are mapped
//! onto [`CheckError`] so the worker can decide whether to retry.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, RETRY_AFTER, SERVER};
use reqwest::StatusCode;
use shirizu_core::error::CheckError;
use shirizu_core::manga::Manga;
use shirizu_core::types::DbId;

use crate::source::{CachePolicy, MangaRepository, RepositoryKind};

/// Default number of details responses kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Remote repository backed by a JSON details endpoint.
pub struct HttpMangaRepository {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<DetailsCache>,
}

impl HttpMangaRepository {
    /// Create a repository for `base_url`, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a repository reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(DetailsCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    /// Keep at most `capacity` details responses; `0` disables caching.
    pub fn with_cache_capacity(self, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(DetailsCache::new(capacity)),
            ..self
        }
    }

    /// Number of cached details responses.
    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> MutexGuard<'_, DetailsCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, manga: &Manga) -> Result<Manga, CheckError> {
        let url = format!("{}/manga/{}", self.base_url, manga.id);
        let response = self
            .client
            .get(&url)
            .query(&[("source", manga.source.as_str())])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, response.headers(), &url));
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        serde_json::from_slice::<Manga>(&body).map_err(|e| CheckError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MangaRepository for HttpMangaRepository {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Remote
    }

    fn name(&self) -> &str {
        "HttpMangaRepository"
    }

    async fn get_details(&self, manga: &Manga, cache: CachePolicy) -> Result<Manga, CheckError> {
        let cached = if cache.read_enabled() {
            self.cache().get(manga.id)
        } else {
            None
        };
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let details = self.fetch(manga).await?;
        if cache.write_enabled() {
            self.cache().insert(manga.id, details.clone());
        }
        Ok(details)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Least recently used details, oldest first.
struct DetailsCache {
    entries: IndexMap<DbId, Manga>,
    capacity: usize,
}

impl DetailsCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cached copy of `manga_id`, marking it most recently used.
    fn get(&mut self, manga_id: DbId) -> Option<Manga> {
        let manga = self.entries.shift_remove(&manga_id)?;
        self.entries.insert(manga_id, manga.clone());
        Some(manga)
    }

    fn insert(&mut self, manga_id: DbId, manga: Manga) {
        if self.capacity == 0 {
            return;
        }
        self.entries.shift_remove(&manga_id);
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(manga_id, manga);
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_transport_error(e: reqwest::Error) -> CheckError {
    if e.is_timeout() {
        CheckError::Timeout
    } else if e.is_decode() {
        CheckError::Parse(e.to_string())
    } else {
        CheckError::Network(e.to_string())
    }
}

fn map_status(status: StatusCode, headers: &HeaderMap, url: &str) -> CheckError {
    let behind_cloudflare = headers.contains_key("cf-mitigated")
        || headers
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("cloudflare"));

    match status {
        StatusCode::TOO_MANY_REQUESTS => CheckError::RateLimited {
            retry_after_secs: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        },
        StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE if behind_cloudflare => {
            CheckError::CloudflareProtected {
                url: url.to_string(),
            }
        }
        StatusCode::NOT_FOUND => CheckError::NotFound,
        other => CheckError::Http {
            status: other.as_u16(),
        },
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use shirizu_core::manga::MangaSource;

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

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = DetailsCache::new(2);
        cache.insert(1, manga(1));
        cache.insert(2, manga(2));
        // Touch 1 so 2 becomes the oldest.
        assert!(cache.get(1).is_some());
        cache.insert(3, manga(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn cache_reinsert_does_not_grow() {
        let mut cache = DetailsCache::new(2);
        cache.insert(1, manga(1));
        cache.insert(1, manga(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_cache_stores_nothing() {
        let mut cache = DetailsCache::new(0);
        cache.insert(1, manga(1));
        assert_eq!(cache.len(), 0);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        let err = map_status(StatusCode::TOO_MANY_REQUESTS, &headers, "u");
        assert_eq!(err, CheckError::RateLimited { retry_after_secs: Some(120) });
    }

    #[test]
    fn cloudflare_challenge_is_detected() {
        let mut headers = HeaderMap::new();
        headers.insert(SERVER, HeaderValue::from_static("cloudflare"));
        let err = map_status(StatusCode::FORBIDDEN, &headers, "https://x/manga/1");
        assert_eq!(
            err,
            CheckError::CloudflareProtected { url: "https://x/manga/1".into() }
        );

        let mut headers = HeaderMap::new();
        headers.insert("cf-mitigated", HeaderValue::from_static("challenge"));
        let err = map_status(StatusCode::SERVICE_UNAVAILABLE, &headers, "u");
        assert!(matches!(err, CheckError::CloudflareProtected { .. }));
    }

    #[test]
    fn plain_statuses() {
        let headers = HeaderMap::new();
        assert_eq!(map_status(StatusCode::NOT_FOUND, &headers, "u"), CheckError::NotFound);
        assert_eq!(
            map_status(StatusCode::FORBIDDEN, &headers, "u"),
            CheckError::Http { status: 403 }
        );
        assert_eq!(
            map_status(StatusCode::BAD_GATEWAY, &headers, "u"),
            CheckError::Http { status: 502 }
        );
    }
}
