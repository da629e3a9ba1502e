use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Invalid file: {message}")]
    InvalidFile { message: String },

    #[error("Invalid file type: {message}")]
    InvalidFileType { message: String },

    #[error("Unreadable PDF structure: {message}")]
    UnreadablePdf { message: String },

    #[error("PDF decode timed out after {seconds}s")]
    DecodeTimeout { seconds: u64 },

    #[error("Page {page} extraction failed: {message}")]
    PageExtraction { page: u32, message: String },

    #[error("No text content could be extracted")]
    NoTextContent,

    #[error("Document appears to be image-based: {failed_pages} of {attempted_pages} pages yielded no text")]
    LikelyImageBased {
        failed_pages: usize,
        attempted_pages: usize,
    },

    #[error("Processing timed out after {seconds}s")]
    ProcessingTimeout { seconds: u64 },

    #[error("No recognizable CV data found in document")]
    LowContentQuality,

    #[error("Field extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error("Missing file in request")]
    MissingFile,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::EmptyFile => "EMPTY_FILE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::InvalidFile { .. } => "INVALID_FILE",
            AppError::InvalidFileType { .. } => "INVALID_FILE_TYPE",
            AppError::UnreadablePdf { .. } => "UNREADABLE_STRUCTURE",
            AppError::DecodeTimeout { .. } => "DECODE_TIMEOUT",
            AppError::PageExtraction { .. } => "PAGE_EXTRACTION_FAILURE",
            AppError::NoTextContent => "NO_TEXT_CONTENT",
            AppError::LikelyImageBased { .. } => "LIKELY_IMAGE_BASED",
            AppError::ProcessingTimeout { .. } => "PROCESSING_TIMEOUT",
            AppError::LowContentQuality => "LOW_CONTENT_QUALITY",
            AppError::ExtractionFailed { .. } => "UNKNOWN_EXTRACTION_ERROR",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::MissingFile => "MISSING_FILE",
            AppError::ConfigError { .. } => "CONFIG_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmptyFile => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidFile { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidFileType { .. } => StatusCode::BAD_REQUEST,
            AppError::UnreadablePdf { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DecodeTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            AppError::PageExtraction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NoTextContent => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::LikelyImageBased { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProcessingTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            AppError::LowContentQuality => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExtractionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the batch loop may reattempt a file after this failure.
    /// Timeouts and transient internal faults are worth another pass;
    /// malformed input and content-level rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::DecodeTimeout { .. }
                | AppError::ProcessingTimeout { .. }
                | AppError::ConfigError { .. }
                | AppError::Internal { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        // Structured logging with context
        tracing::error!(
            error_code = error_code,
            status_code = %status,
            request_id = %request_id,
            error_message = %message,
            "API error occurred"
        );

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "request_id": request_id,
                "timestamp": timestamp
            },
            "data": null
        }));

        (status, body).into_response()
    }
}

// Convert common errors to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidFile {
            message: format!("JSON parsing error: {}", err),
        }
    }
}

// Helper methods for creating specific errors
impl AppError {
    pub fn invalid_file(message: impl Into<String>) -> Self {
        AppError::InvalidFile {
            message: message.into(),
        }
    }

    pub fn invalid_type(message: impl Into<String>) -> Self {
        AppError::InvalidFileType {
            message: message.into(),
        }
    }

    pub fn unreadable(message: impl Into<String>) -> Self {
        AppError::UnreadablePdf {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        AppError::ExtractionFailed {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AppError::ConfigError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }
}
