//! Raga API Gateway
//!
//! HTTP entry point for document ingestion and question answering.
//! Handles:
//! - Multipart uploads into the ingestion pipeline
//! - Cached, grounded query answering
//! - Health, readiness and Prometheus metrics
//! - Observability (logging, request ids, CORS)

mod error;
mod handlers;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use raga_common::{
    cache::create_cache,
    config::AppConfig,
    embeddings::create_embedder,
    index::create_index,
    llm::create_language_model,
    metrics,
    observability::init_tracing,
    rerank::create_reranker,
};
use raga_ingestion::IngestionCoordinator;
use raga_search::{QueryOrchestrator, REFUSAL};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<IngestionCoordinator>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.observability);
    info!("Starting Raga API Gateway v{}", raga_common::VERSION);

    config.validate()?;
    let config = Arc::new(config);

    // Initialize metrics
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    metrics::register_metrics();

    // Capability clients
    let embedder = create_embedder(&config.embedding)?;
    let index = create_index(&config.index, config.embedding.dimension)?;
    let reranker = create_reranker(&config.rerank)?;
    let model = create_language_model(&config.llm, REFUSAL)?;

    info!(provider = %config.cache.provider, "Connecting to cache...");
    let cache = create_cache(&config.cache).await?;

    let coordinator = IngestionCoordinator::from_config(&config, embedder.clone(), index.clone())?;
    let orchestrator = QueryOrchestrator::from_config(&config, embedder, index, reranker, model, cache);

    // Create app state
    let state = AppState {
        config: config.clone(),
        coordinator: Arc::new(coordinator),
        orchestrator: Arc::new(orchestrator),
        metrics: metrics_handle,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .route("/ingest", post(handlers::ingest::ingest_documents))
        .route("/query", post(handlers::query::query_documents))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// CORS for the configured browser origins, with credentials
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
