use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use logo_remix::app_state::AppState;
use logo_remix::config::AppConfig;
use logo_remix::routes;

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

    tracing::info!("Initializing logo-remix server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("restyle_requests_total", "Restyle calls issued, by style");
    metrics::describe_counter!("restyle_failures_total", "Restyle calls that failed, by style");
    metrics::describe_counter!("video_jobs_total", "Video jobs requested");
    metrics::describe_counter!("video_jobs_failed", "Video jobs that failed, by error kind");
    metrics::describe_counter!("video_polls_total", "Video operation polls issued");
    metrics::describe_histogram!(
        "video_generation_seconds",
        "Time from video submission to a downloaded artifact"
    );
    metrics::describe_gauge!(
        "image_batch_in_progress",
        "1 while an image batch is running"
    );

    // Wire generation client, key gate and orchestrators
    tracing::info!(
        image_model = %config.image_model,
        video_model = %config.video_model,
        "Initializing generation client"
    );
    let studio = logo_remix::build_gemini_studio(&config).expect("Failed to initialize studio");
    let state = AppState::new(studio);
    state.studio.refresh_credentials().await;

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/upload", post(routes::studio::upload_image))
        .route("/api/v1/images", get(routes::studio::get_images))
        .route("/api/v1/images/generate", post(routes::studio::generate_images))
        .route(
            "/api/v1/images/{style}/download",
            get(routes::studio::download_image),
        )
        .route(
            "/api/v1/video",
            get(routes::studio::get_video).post(routes::studio::start_video),
        )
        .route("/api/v1/video/cancel", post(routes::studio::cancel_video))
        .route("/api/v1/video/artifact", get(routes::studio::get_video_artifact))
        .route("/api/v1/key", get(routes::studio::key_status))
        .route("/api/v1/key/select", post(routes::studio::select_key))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(20 * 1024 * 1024)); // 20 MB limit

    tracing::info!("Starting logo-remix on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
