use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::PipelinePolicy;
use crate::error::{AppError, AppResult};
use crate::models::{
    BatchOutcome, BatchStats, ExtractedFields, ExtractedRecord, ExtractionSettings, RecordStatus,
    SourceFile,
};
use crate::services::assembler::Assembler;
use crate::services::decoder::{self, Decoder};
use crate::services::extractor::FieldExtractor;

/// Invoked after every file with the records produced so far and a stats
/// snapshot.
pub type ProgressCallback = Box<dyn Fn(&[ExtractedRecord], &BatchStats) + Send + Sync>;

/// Drives decode, assembly, and field extraction across a list of files,
/// strictly one at a time and in input order. Every input file yields exactly
/// one record; no failure mode aborts the batch.
pub struct BatchProcessor {
    policy: PipelinePolicy,
    decoder: Decoder,
    assembler: Assembler,
    extractor: FieldExtractor,
}

impl BatchProcessor {
    pub fn new(policy: PipelinePolicy) -> Self {
        Self {
            policy,
            decoder: Decoder::new(policy),
            assembler: Assembler::new(policy),
            extractor: FieldExtractor::new(),
        }
    }

    pub async fn process(
        &self,
        files: &[SourceFile],
        settings: &ExtractionSettings,
    ) -> BatchOutcome {
        self.process_with_progress(files, settings, None).await
    }

    pub async fn process_with_progress(
        &self,
        files: &[SourceFile],
        settings: &ExtractionSettings,
        progress: Option<ProgressCallback>,
    ) -> BatchOutcome {
        let started = Instant::now();
        let mut stats = BatchStats::new(files.len());
        let mut records: Vec<ExtractedRecord> = Vec::with_capacity(files.len());
        let mut log: Vec<String> = Vec::new();

        log_line(&mut log, format!("Selected {} file(s)", files.len()));

        for (index, file) in files.iter().enumerate() {
            stats.start_file(&file.name);
            log_line(
                &mut log,
                format!("[{}/{}] Processing {}", index + 1, files.len(), file.name),
            );
            info!(file_name = %file.name, size = file.size, "Processing file");

            let record = self.process_file(file, settings, &mut log).await;
            match record.status {
                RecordStatus::Success => {
                    stats.record_success();
                    log_line(&mut log, format!("Completed {}", file.name));
                }
                RecordStatus::Error => {
                    stats.record_failure();
                    let message = record.error_message.as_deref().unwrap_or("unknown error");
                    log_line(&mut log, format!("Failed {}: {}", file.name, message));
                }
            }
            records.push(record);

            if let Some(callback) = progress.as_ref() {
                callback(&records, &stats);
            }

            if index + 1 < files.len() && self.policy.inter_file_pause_ms > 0 {
                tokio::time::sleep(self.policy.inter_file_pause()).await;
            }
        }

        stats.clear_current_file();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        log_line(
            &mut log,
            format!(
                "Batch complete: {} total, {} successful, {} failed in {}ms",
                stats.total, stats.successful, stats.failed, elapsed_ms
            ),
        );
        info!(
            total = stats.total,
            successful = stats.successful,
            failed = stats.failed,
            elapsed_ms,
            "Batch complete"
        );

        BatchOutcome {
            records,
            stats,
            log,
            elapsed_ms,
        }
    }

    /// One file through the retry loop. Recoverable failures are reattempted
    /// from the validation step with a growing backoff; everything else is
    /// final. The returned record carries whatever fields survived.
    async fn process_file(
        &self,
        file: &SourceFile,
        settings: &ExtractionSettings,
        log: &mut Vec<String>,
    ) -> ExtractedRecord {
        let mut attempt = 0u32;
        loop {
            match self.attempt_file(file, settings).await {
                Ok(fields) => {
                    if fields.has_recognizable_content() {
                        return ExtractedRecord::success(file.name.clone(), fields);
                    }
                    // Content-quality demotion: structurally fine, but nothing
                    // CV-shaped was recognized. The partial fields stay on the
                    // record.
                    let message = AppError::LowContentQuality.to_string();
                    warn!(file_name = %file.name, "{}", message);
                    return ExtractedRecord::failure(file.name.clone(), fields, message);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        file_name = %file.name,
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %err,
                        "Retrying after recoverable failure"
                    );
                    log_line(
                        log,
                        format!(
                            "Retry {}/{} for {} after: {}",
                            attempt, self.policy.max_retries, file.name, err
                        ),
                    );
                    tokio::time::sleep(self.policy.retry_backoff(attempt)).await;
                }
                Err(err) => {
                    return ExtractedRecord::failure(
                        file.name.clone(),
                        ExtractedFields::default(),
                        err.to_string(),
                    );
                }
            }
        }
    }

    /// Validating then Extracting. Validation rejects cheaply, before any
    /// decode work; the extraction pipeline runs under the size-scaled
    /// per-file budget, which supersedes the per-stage timeouts.
    async fn attempt_file(
        &self,
        file: &SourceFile,
        settings: &ExtractionSettings,
    ) -> AppResult<ExtractedFields> {
        if file.content.is_empty() {
            return Err(AppError::EmptyFile);
        }
        if file.size > self.policy.max_file_size_bytes() {
            return Err(AppError::FileTooLarge {
                size: file.size.div_ceil(1024 * 1024),
                limit: self.policy.max_file_size_mb,
            });
        }
        if !file.is_pdf() {
            return Err(AppError::invalid_type(format!(
                "{} is not a PDF document",
                file.name
            )));
        }

        let budget = self.policy.file_timeout(file.size);
        match timeout(budget, self.run_pipeline(file, settings)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ProcessingTimeout {
                seconds: budget.as_secs(),
            }),
        }
    }

    async fn run_pipeline(
        &self,
        file: &SourceFile,
        settings: &ExtractionSettings,
    ) -> AppResult<ExtractedFields> {
        let document = self.decoder.decode(file.content.clone()).await?;

        let text = match self.assembler.assemble(&document).await {
            Ok(report) => {
                debug!(
                    file_name = %file.name,
                    processed_pages = report.processed_pages,
                    failed_pages = report.failed_pages,
                    chars = report.text.len(),
                    "Text assembled"
                );
                report.text
            }
            Err(err) => {
                let fallback_eligible = matches!(
                    err,
                    AppError::NoTextContent | AppError::LikelyImageBased { .. }
                );
                if !fallback_eligible || !self.policy.whole_doc_fallback {
                    return Err(err);
                }
                if decoder::looks_image_based(&file.content) {
                    warn!(file_name = %file.name, "Stream markers suggest a scanned document");
                }
                match self.assembler.whole_document_text(file.content.clone()).await {
                    Ok(text) if text.len() >= self.policy.min_text_length => {
                        info!(
                            file_name = %file.name,
                            chars = text.len(),
                            "Whole-document fallback recovered text"
                        );
                        text
                    }
                    _ => return Err(err),
                }
            }
        };

        // Decoded structures are released before field extraction begins.
        drop(document);

        match catch_unwind(AssertUnwindSafe(|| self.extractor.extract(&text, settings))) {
            Ok(fields) => Ok(fields),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(file_name = %file.name, "Field extraction panicked: {}", message);
                Err(AppError::extraction(message))
            }
        }
    }
}

fn log_line(log: &mut Vec<String>, message: String) {
    log.push(format!(
        "[{}] {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
        message
    ));
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown extraction failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::services::testpdf;

    fn policy() -> PipelinePolicy {
        PipelinePolicy {
            inter_file_pause_ms: 0,
            ..Default::default()
        }
    }

    fn cv_pdf() -> SourceFile {
        let bytes = testpdf::single_page(&[
            "Jane Smith",
            "jane.smith@example.com",
            "(415) 555-0101",
            "San Francisco, CA",
            "SKILLS",
            "Python, Go, SQL",
        ]);
        SourceFile::new("jane.pdf".to_string(), bytes)
    }

    fn lorem_pdf() -> SourceFile {
        let bytes = testpdf::single_page(&[
            "lorem ipsum dolor sit amet consectetur adipiscing elit",
            "sed do eiusmod tempor incididunt ut labore et dolore",
        ]);
        SourceFile::new("lorem.pdf".to_string(), bytes)
    }

    #[tokio::test]
    async fn every_file_yields_one_record_in_input_order() {
        let files = vec![
            cv_pdf(),
            SourceFile::new("empty.pdf".to_string(), Vec::new()),
            SourceFile::new("garbage.pdf".to_string(), b"not a pdf at all".to_vec()),
        ];
        let outcome = BatchProcessor::new(policy())
            .process(&files, &ExtractionSettings::default())
            .await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].filename, "jane.pdf");
        assert_eq!(outcome.records[1].filename, "empty.pdf");
        assert_eq!(outcome.records[2].filename, "garbage.pdf");

        assert!(outcome.records[0].is_success());
        assert!(!outcome.records[1].is_success());
        assert!(!outcome.records[2].is_success());

        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.processed, 3);
        assert_eq!(outcome.stats.successful, 1);
        assert_eq!(outcome.stats.failed, 2);
        assert!(outcome.stats.current_file.is_none());
    }

    #[tokio::test]
    async fn zero_byte_file_fails_without_decode() {
        let files = vec![SourceFile::new("empty.pdf".to_string(), Vec::new())];
        let outcome = BatchProcessor::new(policy())
            .process(&files, &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .to_lowercase()
            .contains("empty"));
    }

    #[tokio::test]
    async fn non_pdf_declared_type_is_rejected() {
        let file = SourceFile::new("notes.txt".to_string(), b"hello world".to_vec())
            .with_mime_type("text/plain".to_string());
        let outcome = BatchProcessor::new(policy())
            .process(&[file], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .contains("not a PDF"));
    }

    #[tokio::test]
    async fn recognizable_cv_extracts_fields_end_to_end() {
        let outcome = BatchProcessor::new(policy())
            .process(&[cv_pdf()], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(record.is_success());
        assert_eq!(record.fields.first_name.as_deref(), Some("Jane"));
        assert_eq!(record.fields.last_name.as_deref(), Some("Smith"));
        assert_eq!(
            record.fields.email.as_deref(),
            Some("jane.smith@example.com")
        );
        assert_eq!(record.fields.phone.as_deref(), Some("(415) 555-0101"));
        assert_eq!(record.fields.location.as_deref(), Some("San Francisco, CA"));
        assert_eq!(
            record.fields.skills,
            Some(vec![
                "Python".to_string(),
                "Go".to_string(),
                "SQL".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn unrecognizable_content_is_demoted_by_the_quality_gate() {
        let outcome = BatchProcessor::new(policy())
            .process(&[lorem_pdf()], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .to_lowercase()
            .contains("no recognizable cv data"));
    }

    #[tokio::test]
    async fn disabled_toggle_is_absent_end_to_end() {
        let settings = ExtractionSettings {
            extract_email: false,
            ..Default::default()
        };
        let outcome = BatchProcessor::new(policy()).process(&[cv_pdf()], &settings).await;

        let record = &outcome.records[0];
        assert!(record.is_success());
        assert!(record.fields.email.is_none());
        assert_eq!(record.fields.first_name.as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn progress_fires_after_every_file_with_monotonic_stats() {
        let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |records, stats| {
            sink.lock().unwrap().push((records.len(), stats.processed));
        });

        let files = vec![
            cv_pdf(),
            SourceFile::new("empty.pdf".to_string(), Vec::new()),
        ];
        BatchProcessor::new(policy())
            .process_with_progress(&files, &ExtractionSettings::default(), Some(callback))
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(1, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn blank_document_without_fallback_is_no_text_content() {
        let no_fallback = PipelinePolicy {
            whole_doc_fallback: false,
            inter_file_pause_ms: 0,
            ..Default::default()
        };
        let file = SourceFile::new("blank.pdf".to_string(), testpdf::single_page(&[]));
        let outcome = BatchProcessor::new(no_fallback)
            .process(&[file], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .contains("No text content"));
    }

    #[tokio::test]
    async fn fallback_cannot_rescue_a_blank_document() {
        // Fallback enabled, but the whole-document pass finds nothing either,
        // so the original classification stands.
        let file = SourceFile::new("blank.pdf".to_string(), testpdf::single_page(&[]));
        let outcome = BatchProcessor::new(policy())
            .process(&[file], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .contains("No text content"));
    }

    #[tokio::test]
    async fn oversize_report_rounds_up_partial_megabytes() {
        let tight = PipelinePolicy {
            max_file_size_mb: 1,
            inter_file_pause_ms: 0,
            ..Default::default()
        };
        let file = SourceFile::new("big.pdf".to_string(), vec![0u8; 1_600_000]);
        let outcome = BatchProcessor::new(tight)
            .process(&[file], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record
            .error_message
            .as_ref()
            .unwrap()
            .contains("2MB exceeds limit of 1MB"));
    }

    #[tokio::test]
    async fn timeouts_are_retried_then_reported() {
        let tight = PipelinePolicy {
            file_timeout_base_seconds: 0,
            file_timeout_max_seconds: 0,
            max_retries: 1,
            retry_backoff_ms: 1,
            inter_file_pause_ms: 0,
            ..Default::default()
        };
        let outcome = BatchProcessor::new(tight)
            .process(&[cv_pdf()], &ExtractionSettings::default())
            .await;

        let record = &outcome.records[0];
        assert!(!record.is_success());
        assert!(record.error_message.as_ref().unwrap().contains("timed out"));
        assert!(outcome.log.iter().any(|line| line.contains("Retry 1/1")));
    }

    #[tokio::test]
    async fn batch_log_covers_selection_files_and_completion() {
        let outcome = BatchProcessor::new(policy())
            .process(&[cv_pdf()], &ExtractionSettings::default())
            .await;

        assert!(outcome.log[0].contains("Selected 1 file"));
        assert!(outcome.log.iter().any(|l| l.contains("Processing jane.pdf")));
        assert!(outcome.log.iter().any(|l| l.contains("Completed jane.pdf")));
        assert!(outcome
            .log
            .last()
            .unwrap()
            .contains("Batch complete: 1 total, 1 successful, 0 failed"));
    }
}
