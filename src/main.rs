mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{annotator::Annotator, providers};

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

    tracing::info!("Initializing image-gallery-api server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "annotation_processing_seconds",
        "Time to annotate one submitted image"
    );
    metrics::describe_counter!("annotation_jobs_total", "Total annotation jobs submitted");
    metrics::describe_counter!(
        "annotation_jobs_completed",
        "Total annotation jobs completed"
    );
    metrics::describe_counter!(
        "annotation_jobs_failed",
        "Total annotation jobs whose results could not be persisted"
    );
    metrics::describe_counter!(
        "annotation_cache_hits",
        "Annotation requests served from the in-memory cache"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Select the vision provider once at startup
    let provider = providers::build_provider(&config);
    tracing::info!(
        service = %config.ai_service,
        provider = provider.name(),
        key_configured = config.ai_api_key.is_some(),
        "Vision provider initialized"
    );

    let annotator = Annotator::new(provider, reqwest::Client::new(), config.cache_capacity);

    // Create shared application state
    let state = AppState::new(
        db_pool,
        annotator,
        config.ai_service.clone(),
        config.ai_api_key.is_some(),
    );

    // Build API routes
    let app = Router::new()
        .route(
            "/",
            get(|| async { Json(json!({"message": "AI Image Gallery API", "status": "running"})) }),
        )
        .route("/api/health", get(routes::health::health_check))
        .route("/api/process-image", post(routes::images::process_image))
        .route("/api/search", get(routes::images::search_images))
        .route("/api/similar/{image_id}", get(routes::images::similar_images))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting image-gallery-api on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
