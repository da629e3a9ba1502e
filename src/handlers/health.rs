use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::time::SystemTime;
use tracing::info;

use crate::error::AppResult;
use crate::middleware::rate_limit;
use crate::services::decoder;

/// Health check endpoint
pub async fn health_handler() -> AppResult<Json<Value>> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let decoder_ready = decoder::ensure_ready();
    let (total_requests, rejected_requests, available_permits) = rate_limit::metrics();

    let status = if decoder_ready { "healthy" } else { "degraded" };

    let response = json!({
        "status": status,
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cvsift",
        "decoder_ready": decoder_ready,
        "rate_limiting": {
            "total_requests": total_requests,
            "rejected_requests": rejected_requests,
            "available_permits": available_permits,
            "rejection_rate": if total_requests > 0 {
                (rejected_requests as f64 / total_requests as f64 * 100.0).round() / 100.0
            } else {
                0.0
            }
        }
    });

    info!(
        status = status,
        decoder_ready = decoder_ready,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint (for Kubernetes/Railway)
pub async fn ready_handler() -> Result<StatusCode, StatusCode> {
    if decoder::ensure_ready() {
        info!("Readiness check passed");
        Ok(StatusCode::OK)
    } else {
        info!("Readiness check failed - decoder unavailable");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
