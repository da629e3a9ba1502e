use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_concurrent_requests: usize,
    pub max_file_size_mb: usize,
    pub max_pages: usize,
    pub page_timeout_seconds: u64,
    pub decode_timeout_seconds: u64,
    pub file_timeout_base_seconds: u64,
    pub file_timeout_max_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub inter_file_pause_ms: u64,
    pub min_text_length: usize,
    pub whole_doc_fallback: bool,
}

/// The policy constants that parameterize one pipeline run. Everything the
/// decoder, assembler, and batch loop need, detached from the server-side
/// settings so library callers can construct it directly.
#[derive(Debug, Clone, Copy)]
pub struct PipelinePolicy {
    pub max_file_size_mb: usize,
    pub max_pages: usize,
    pub page_timeout_seconds: u64,
    pub decode_timeout_seconds: u64,
    pub file_timeout_base_seconds: u64,
    pub file_timeout_max_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub inter_file_pause_ms: u64,
    pub min_text_length: usize,
    pub whole_doc_fallback: bool,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            max_pages: 25,
            page_timeout_seconds: 10,
            decode_timeout_seconds: 20,
            file_timeout_base_seconds: 30,
            file_timeout_max_seconds: 90,
            max_retries: 2,
            retry_backoff_ms: 250,
            inter_file_pause_ms: 50,
            min_text_length: 50,
            whole_doc_fallback: true,
        }
    }
}

impl PipelinePolicy {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_seconds)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_seconds)
    }

    /// Per-file budget grows with file size and supersedes the per-page
    /// timeouts: base + 2s per megabyte, capped at the configured maximum.
    pub fn file_timeout(&self, file_size_bytes: usize) -> Duration {
        let size_mb = (file_size_bytes / (1024 * 1024)) as u64;
        let seconds =
            (self.file_timeout_base_seconds + 2 * size_mb).min(self.file_timeout_max_seconds);
        Duration::from_secs(seconds)
    }

    /// Linear backoff: attempt 1 waits one backoff unit, attempt 2 waits two.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms * attempt as u64)
    }

    pub fn inter_file_pause(&self) -> Duration {
        Duration::from_millis(self.inter_file_pause_ms)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: 0.0.0.0");
                "0.0.0.0".to_string()
            }),
            server_port: Self::parse_env_var("SERVER_PORT", 8080)
                .context("Failed to parse SERVER_PORT")?,
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", 100)
                .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", 50)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_pages: Self::parse_env_var("MAX_PAGES", 25).context("Failed to parse MAX_PAGES")?,
            page_timeout_seconds: Self::parse_env_var("PAGE_TIMEOUT_SECONDS", 10)
                .context("Failed to parse PAGE_TIMEOUT_SECONDS")?,
            decode_timeout_seconds: Self::parse_env_var("DECODE_TIMEOUT_SECONDS", 20)
                .context("Failed to parse DECODE_TIMEOUT_SECONDS")?,
            file_timeout_base_seconds: Self::parse_env_var("FILE_TIMEOUT_BASE_SECONDS", 30)
                .context("Failed to parse FILE_TIMEOUT_BASE_SECONDS")?,
            file_timeout_max_seconds: Self::parse_env_var("FILE_TIMEOUT_MAX_SECONDS", 90)
                .context("Failed to parse FILE_TIMEOUT_MAX_SECONDS")?,
            max_retries: Self::parse_env_var("MAX_RETRIES", 2)
                .context("Failed to parse MAX_RETRIES")?,
            retry_backoff_ms: Self::parse_env_var("RETRY_BACKOFF_MS", 250)
                .context("Failed to parse RETRY_BACKOFF_MS")?,
            inter_file_pause_ms: Self::parse_env_var("INTER_FILE_PAUSE_MS", 50)
                .context("Failed to parse INTER_FILE_PAUSE_MS")?,
            min_text_length: Self::parse_env_var("MIN_TEXT_LENGTH", 50)
                .context("Failed to parse MIN_TEXT_LENGTH")?,
            whole_doc_fallback: Self::parse_env_var("WHOLE_DOC_FALLBACK", true)
                .context("Failed to parse WHOLE_DOC_FALLBACK")?,
        };

        // Validate configuration values
        config.validate()?;

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!(
                        "Failed to parse {}: {} (using default: {:?})",
                        var_name, e, default
                    );
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_REQUESTS must be greater than 0"
            ));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_pages == 0 {
            return Err(anyhow::anyhow!("MAX_PAGES must be greater than 0"));
        }
        if self.page_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("PAGE_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.decode_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "DECODE_TIMEOUT_SECONDS must be greater than 0"
            ));
        }
        if self.file_timeout_base_seconds == 0 {
            return Err(anyhow::anyhow!(
                "FILE_TIMEOUT_BASE_SECONDS must be greater than 0"
            ));
        }
        if self.file_timeout_max_seconds < self.file_timeout_base_seconds {
            return Err(anyhow::anyhow!(
                "FILE_TIMEOUT_MAX_SECONDS must be at least FILE_TIMEOUT_BASE_SECONDS"
            ));
        }
        if self.min_text_length == 0 {
            return Err(anyhow::anyhow!("MIN_TEXT_LENGTH must be greater than 0"));
        }
        Ok(())
    }

    pub fn pipeline_policy(&self) -> PipelinePolicy {
        PipelinePolicy {
            max_file_size_mb: self.max_file_size_mb,
            max_pages: self.max_pages,
            page_timeout_seconds: self.page_timeout_seconds,
            decode_timeout_seconds: self.decode_timeout_seconds,
            file_timeout_base_seconds: self.file_timeout_base_seconds,
            file_timeout_max_seconds: self.file_timeout_max_seconds,
            max_retries: self.max_retries,
            retry_backoff_ms: self.retry_backoff_ms,
            inter_file_pause_ms: self.inter_file_pause_ms,
            min_text_length: self.min_text_length,
            whole_doc_fallback: self.whole_doc_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_timeout_scales_with_size_and_caps() {
        let policy = PipelinePolicy::default();
        assert_eq!(policy.file_timeout(0), Duration::from_secs(30));
        assert_eq!(
            policy.file_timeout(10 * 1024 * 1024),
            Duration::from_secs(50)
        );
        assert_eq!(
            policy.file_timeout(45 * 1024 * 1024),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn retry_backoff_grows_linearly() {
        let policy = PipelinePolicy::default();
        assert_eq!(policy.retry_backoff(1), Duration::from_millis(250));
        assert_eq!(policy.retry_backoff(2), Duration::from_millis(500));
    }
}
