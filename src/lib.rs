//! cvsift - CV Parsing Service
//!
//! A batch CV (resume) parsing service: callers post presumed-PDF documents,
//! the service extracts their text page by page, runs a regex cascade over
//! the normalized text to recover structured fields, and returns ordered
//! per-file records plus batch statistics, with CSV export.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::{Config, PipelinePolicy};
pub use error::{AppError, AppResult};
