//! Integration tests for the HTTP details repository against a local
//! single-purpose HTTP server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shirizu_core::error::CheckError;
use shirizu_tracker::{CachePolicy, HttpMangaRepository, MangaRepository};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use common::*;

/// Serve `response` (raw status line plus headers and body) to every
/// connection and count requests.
async fn serve(status: &'static str, headers: &'static str, body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            // GET requests carry no body; the headers fit in one read.
            let _ = stream.read(&mut buf).await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            let response = format!(
                "HTTP/1.1 {status}\r\n{headers}Content-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
    });
    (base_url, hits)
}

fn repository(base_url: &str) -> HttpMangaRepository {
    HttpMangaRepository::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetches_and_caches_details() {
    let details = manga_with(1, &[1, 2, 3]);
    let (url, hits) = serve("200 OK", "", serde_json::to_string(&details).unwrap()).await;
    let repo = repository(&url);

    let fetched = repo.get_details(&manga(1), CachePolicy::WriteOnly).await.unwrap();
    assert_eq!(fetched, details);
    assert_eq!(repo.cached_len(), 1);

    // WriteOnly never reads the cache.
    repo.get_details(&manga(1), CachePolicy::WriteOnly).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Enabled serves the cached copy.
    repo.get_details(&manga(1), CachePolicy::Enabled).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disabled_cache_is_not_written() {
    let details = manga_with(1, &[1]);
    let (url, _) = serve("200 OK", "", serde_json::to_string(&details).unwrap()).await;
    let repo = repository(&url);
    repo.get_details(&manga(1), CachePolicy::Disabled).await.unwrap();
    assert_eq!(repo.cached_len(), 0);
}

#[tokio::test]
async fn test_cache_is_bounded() {
    let details = manga_with(1, &[1]);
    let (url, hits) = serve("200 OK", "", serde_json::to_string(&details).unwrap()).await;
    let repo = repository(&url).with_cache_capacity(2);

    for id in 1..=5 {
        repo.get_details(&manga(id), CachePolicy::WriteOnly).await.unwrap();
    }
    assert_eq!(repo.cached_len(), 2);

    // The newest entries survive; the oldest were evicted.
    repo.get_details(&manga(5), CachePolicy::Enabled).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 5);
    repo.get_details(&manga(1), CachePolicy::Enabled).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_maps_rate_limit() {
    let (url, _) = serve("429 Too Many Requests", "Retry-After: 30\r\n", String::new()).await;
    let err = repository(&url)
        .get_details(&manga(1), CachePolicy::WriteOnly)
        .await
        .unwrap_err();
    assert_eq!(err, CheckError::RateLimited { retry_after_secs: Some(30) });
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_maps_cloudflare_challenge() {
    let (url, _) = serve("403 Forbidden", "Server: cloudflare\r\n", String::new()).await;
    let err = repository(&url)
        .get_details(&manga(1), CachePolicy::WriteOnly)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::CloudflareProtected { .. }));
}

#[tokio::test]
async fn test_maps_not_found_and_bad_body() {
    let (url, _) = serve("404 Not Found", "", String::new()).await;
    let err = repository(&url)
        .get_details(&manga(1), CachePolicy::WriteOnly)
        .await
        .unwrap_err();
    assert_eq!(err, CheckError::NotFound);

    let (url, _) = serve("200 OK", "", "{\"nope\":true}".to_string()).await;
    let err = repository(&url)
        .get_details(&manga(1), CachePolicy::WriteOnly)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Parse(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let err = repository(&url)
        .get_details(&manga(1), CachePolicy::WriteOnly)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Network(_)));
    assert!(err.is_retryable());
}
