use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PipelinePolicy;
use crate::error::{AppError, AppResult};
use crate::middleware::rate_limit;
use crate::models::{ExtractionSettings, ParseResponse, SourceFile};
use crate::services::{BatchProcessor, CsvExporter};

#[derive(Clone)]
pub struct AppState {
    pub policy: PipelinePolicy,
}

/// Runs one batch over the uploaded files and returns the ordered record
/// list, the final stats, and the human-readable batch log as JSON.
pub async fn parse_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ParseResponse>> {
    let start = Instant::now();
    let request_id = short_request_id();

    info!(request_id = %request_id, "Starting CV parse request");

    let _permit = rate_limit::acquire_permit().map_err(|e| {
        warn!(request_id = %request_id, "Rate limit exceeded");
        e
    })?;

    let (files, settings) = read_batch(multipart).await?;
    info!(
        request_id = %request_id,
        file_count = files.len(),
        "Batch received"
    );

    let outcome = BatchProcessor::new(state.policy)
        .process(&files, &settings)
        .await;

    let total_time = start.elapsed().as_millis() as u64;
    info!(
        request_id = %request_id,
        successful = outcome.stats.successful,
        failed = outcome.stats.failed,
        total_time_ms = total_time,
        "Parse request completed"
    );

    Ok(Json(ParseResponse::new(
        outcome.records,
        outcome.stats,
        outcome.log,
        total_time,
    )))
}

#[derive(Debug, Deserialize)]
pub struct CsvParams {
    /// When set, a summary section with run counters and the export
    /// timestamp follows the records table.
    #[serde(default)]
    pub include_summary: bool,
}

/// Same batch run as `parse_handler`, rendered as a CSV attachment.
pub async fn parse_csv_handler(
    State(state): State<AppState>,
    Query(params): Query<CsvParams>,
    multipart: Multipart,
) -> AppResult<Response> {
    let request_id = short_request_id();

    info!(request_id = %request_id, "Starting CV parse request (CSV export)");

    let _permit = rate_limit::acquire_permit().map_err(|e| {
        warn!(request_id = %request_id, "Rate limit exceeded");
        e
    })?;

    let (files, settings) = read_batch(multipart).await?;
    let outcome = BatchProcessor::new(state.policy)
        .process(&files, &settings)
        .await;

    let exporter = CsvExporter::new();
    let csv = if params.include_summary {
        exporter.render_with_summary(&outcome.records, &outcome.stats)?
    } else {
        exporter.render(&outcome.records)?
    };

    info!(
        request_id = %request_id,
        records = outcome.stats.total,
        bytes = csv.len(),
        "CSV export rendered"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"cv_export.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Collects the uploaded files and the optional settings part. Repeated
/// `files` parts carry the documents in batch order; a `settings` part, when
/// present, is the JSON toggle object. Per-file validation (size, type,
/// emptiness) is the orchestrator's job, so every uploaded file is kept here
/// and gets its own record downstream.
async fn read_batch(mut multipart: Multipart) -> AppResult<(Vec<SourceFile>, ExtractionSettings)> {
    let mut files: Vec<SourceFile> = Vec::new();
    let mut settings = ExtractionSettings::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::invalid_file(format!("Failed to read multipart field: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "files" | "file" => {
                let name = field.file_name().unwrap_or("unknown.pdf").to_string();
                let content_type = field.content_type().map(|ct| ct.to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::invalid_file(format!("Failed to read file data: {}", e))
                })?;

                let mut file = SourceFile::new(name, data.to_vec());
                if let Some(mime_type) = content_type {
                    file = file.with_mime_type(mime_type);
                }
                debug!(
                    file_name = %file.name,
                    size = file.size,
                    mime_type = ?file.mime_type,
                    "File received"
                );
                files.push(file);
            }
            "settings" => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::invalid_file(format!("Failed to read settings data: {}", e))
                })?;
                settings = serde_json::from_slice(&data)?;
                debug!(settings = ?settings, "Settings received");
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::MissingFile);
    }
    Ok((files, settings))
}

fn short_request_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}
