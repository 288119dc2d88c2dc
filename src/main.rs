use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use resale_price_checker::{
    app_state::AppState,
    build_router,
    config::AppConfig,
    routes::{self, analysis::MAX_REQUEST_BYTES},
};

/// How long shutdown waits for running analyses.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

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

    tracing::info!("Initializing resale-price-checker server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "analysis_jobs_submitted_total",
        "Total analysis jobs accepted"
    );
    metrics::describe_counter!(
        "analysis_jobs_completed_total",
        "Total analysis jobs that reached completed"
    );
    metrics::describe_counter!(
        "analysis_jobs_failed_total",
        "Total analysis jobs that reached error"
    );
    metrics::describe_histogram!(
        "analysis_processing_seconds",
        "Time from processing start to terminal state"
    );
    metrics::describe_gauge!(
        "analysis_jobs_in_flight",
        "Analyses currently calling providers"
    );

    // Storage, registry and providers
    let state = AppState::from_config(&config).expect("Failed to initialize application state");
    let orchestrator = state.orchestrator.clone();

    let app = build_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!(in_flight = orchestrator.in_flight(), "Waiting for running analyses");
    orchestrator.shutdown(SHUTDOWN_GRACE).await;
    orchestrator.registry().shutdown().await;

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
