mod app_state;
mod config;
mod models;
mod routes;
mod services;

use axum::extract::State;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    media::MediaTransform, notify::Notifier, providers::ProviderRegistry, queue::TaskQueue,
    storage::R2Client,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing media-task server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("media_jobs_submitted", "Total generation jobs submitted");
    metrics::describe_counter!("media_jobs_completed", "Total generation jobs completed");
    metrics::describe_counter!("media_jobs_failed", "Total generation jobs that failed");
    metrics::describe_counter!(
        "media_poll_retries",
        "Total provider status checks that were rescheduled"
    );

    // Initialize Redis task queue
    tracing::info!("Connecting to Redis task queue");
    let queue = TaskQueue::new(&config.redis_url).expect("Failed to initialize task queue");

    // Initialize R2 storage client
    tracing::info!("Initializing R2 storage client");
    let storage = R2Client::new(
        &config.r2_bucket,
        &config.r2_public_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    // Initialize remaining collaborators
    let notifier = Notifier::new(&config.notify_url);
    let media = MediaTransform::new(&config.ffmpeg_bin);
    let providers = ProviderRegistry::from_config(&config);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, queue, storage, notifier, media, providers);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/queue/image", post(routes::enqueue::enqueue_image))
        .route("/api/v1/queue/video", post(routes::enqueue::enqueue_video))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(256 * 1024)); // JSON bodies only

    tracing::info!("Starting media-task on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

/// Prometheus scrape endpoint, in text exposition format.
async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
