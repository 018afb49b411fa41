use std::sync::Arc;
use std::time::Duration;

use shirizu_events::{EventBus, LogNotifier, Notifier, WebhookNotifier};
use shirizu_tracker::{HttpMangaRepository, SourceRegistry, Tracker, TrackingRepository};
use shirizu_worker::{TrackScheduler, TrackWorker, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shirizu_worker=debug,shirizu_tracker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().expect("Invalid worker configuration");

    // --- Database ---
    let pool = shirizu_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    shirizu_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    shirizu_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Tracker ---
    let bus = Arc::new(EventBus::default());
    let store = Arc::new(TrackingRepository::new(pool.clone(), bus));
    let remote = HttpMangaRepository::new(&config.source_base_url, config.source_timeout())
        .expect("Failed to build source HTTP client");
    let sources = Arc::new(SourceRegistry::new(Arc::new(remote)));
    let tracker = Arc::new(Tracker::new(store, sources, config.history_notifications));

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering update notifications to webhook");
            Arc::new(WebhookNotifier::new(url.clone()).expect("Failed to build webhook client"))
        }
        None => Arc::new(LogNotifier),
    };

    // --- Scheduler ---
    let worker = Arc::new(TrackWorker::new(
        tracker,
        notifier,
        pool.clone(),
        config.worker_settings(),
    ));
    let shutdown = CancellationToken::new();
    let scheduler = TrackScheduler::new(worker, config.scheduler_settings(), shutdown.clone());
    scheduler.schedule();

    shutdown_signal().await;

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler.unschedule()).await;
    pool.close().await;
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
