use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::env;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;
use handlers::{health_handler, parse_csv_handler, parse_handler, ready_handler, AppState};
use middleware::logging::logging_middleware;
use services::decoder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cvsift=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting cvsift CV Parsing Service");
    tracing::info!("Max file size: {}MB", config.max_file_size_mb);
    tracing::info!("Max pages per document: {}", config.max_pages);
    tracing::info!("Max concurrent requests: {}", config.max_concurrent_requests);

    // Warm up the decoder once; a failed probe degrades /health and /ready
    // but does not block startup.
    if !decoder::ensure_ready() {
        tracing::warn!("Decoder readiness probe failed");
    }

    let state = AppState {
        policy: config.pipeline_policy(),
    };

    // Build our application with routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/api/v1/parse", post(parse_handler))
        .route("/api/v1/parse/export", post(parse_csv_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                // One upload carries a whole batch, so the body limit is a
                // multiple of the per-file ceiling.
                .layer(DefaultBodyLimit::max(
                    config.max_file_size_mb * 1024 * 1024 * 4,
                ))
                .layer(axum::middleware::from_fn(logging_middleware)),
        );

    // Determine port from environment (Railway compatibility)
    let port = env::var("PORT")
        .unwrap_or_else(|_| config.server_port.to_string())
        .parse::<u16>()
        .unwrap_or(config.server_port);

    let host = config.server_host;
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
