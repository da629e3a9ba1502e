use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::PipelinePolicy;
use crate::error::{AppError, AppResult};
use crate::services::decoder::DecodedDocument;

#[derive(Debug)]
pub struct AssemblyReport {
    pub text: String,
    pub processed_pages: usize,
    pub failed_pages: usize,
}

pub struct Assembler {
    policy: PipelinePolicy,
}

impl Assembler {
    pub fn new(policy: PipelinePolicy) -> Self {
        Self { policy }
    }

    /// Walks the decoded pages and assembles the normalized text. Each page's
    /// fragment fetch runs on a blocking worker under the page budget; a page
    /// that times out or fails is counted and excluded without aborting the
    /// document.
    pub async fn assemble(&self, document: &DecodedDocument) -> AppResult<AssemblyReport> {
        let mut page_texts: Vec<String> = Vec::new();
        let mut processed_pages = 0usize;
        let mut failed_pages = 0usize;
        let page_budget = self.policy.page_timeout();

        for &page_number in document.page_numbers() {
            let doc = document.clone();
            let handle = tokio::task::spawn_blocking(move || doc.page_fragments(page_number));

            match timeout(page_budget, handle).await {
                Ok(Ok(Ok(fragments))) => {
                    let lines: Vec<String> = fragments
                        .iter()
                        .map(|f| normalize_fragment(f))
                        .filter(|l| !l.is_empty())
                        .collect();
                    debug!(
                        "Page {} yielded {} fragments, {} kept",
                        page_number,
                        fragments.len(),
                        lines.len()
                    );
                    processed_pages += 1;
                    if !lines.is_empty() {
                        page_texts.push(lines.join("\n"));
                    }
                }
                Ok(Ok(Err(e))) => {
                    warn!("Page {} extraction failed: {}", page_number, e);
                    failed_pages += 1;
                }
                Ok(Err(e)) => {
                    warn!("Page {} extraction worker failed: {}", page_number, e);
                    failed_pages += 1;
                }
                Err(_) => {
                    warn!(
                        "Page {} extraction exceeded its {}s budget",
                        page_number, self.policy.page_timeout_seconds
                    );
                    failed_pages += 1;
                }
            }
        }

        validate_assembly(
            page_texts.join("\n"),
            processed_pages,
            failed_pages,
            self.policy.min_text_length,
        )
    }

    /// Whole-document fallback pass. Slower and structure-blind, used only
    /// when per-page assembly came back empty. The result is normalized the
    /// same way as the per-page text.
    pub async fn whole_document_text(&self, bytes: Vec<u8>) -> AppResult<String> {
        let handle = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));
        match handle.await {
            Ok(Ok(text)) => {
                let normalized = normalize_text(&text);
                if normalized.is_empty() {
                    Err(AppError::NoTextContent)
                } else {
                    Ok(normalized)
                }
            }
            Ok(Err(e)) => Err(AppError::unreadable(format!(
                "Whole-document extraction failed: {}",
                e
            ))),
            Err(e) => Err(AppError::internal(format!(
                "Extraction worker failed: {}",
                e
            ))),
        }
    }
}

/// Collapses every whitespace run (ASCII and Unicode space variants) inside
/// one fragment to a single ASCII space and trims the ends.
fn normalize_fragment(fragment: &str) -> String {
    fragment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Line-wise normalization of a whole text blob: fragments keep their line
/// boundaries, empty lines are dropped.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(normalize_fragment)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_assembly(
    text: String,
    processed_pages: usize,
    failed_pages: usize,
    min_text_length: usize,
) -> AppResult<AssemblyReport> {
    if text.is_empty() {
        return Err(AppError::NoTextContent);
    }
    if text.len() < min_text_length && failed_pages > processed_pages {
        return Err(AppError::LikelyImageBased {
            failed_pages,
            attempted_pages: processed_pages + failed_pages,
        });
    }
    Ok(AssemblyReport {
        text,
        processed_pages,
        failed_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::decoder::Decoder;
    use crate::services::testpdf;

    fn policy() -> PipelinePolicy {
        PipelinePolicy::default()
    }

    #[tokio::test]
    async fn assembles_pages_into_line_separated_text() {
        let bytes = testpdf::build_pdf(&[
            &["Jane Smith", "jane.smith@example.com"],
            &["SKILLS", "Python, Go, SQL"],
        ]);
        let decoder = Decoder::new(policy());
        let doc = decoder.decode(bytes).await.unwrap();

        let report = Assembler::new(policy()).assemble(&doc).await.unwrap();
        assert_eq!(report.processed_pages, 2);
        assert_eq!(report.failed_pages, 0);

        let lines: Vec<&str> = report.text.lines().collect();
        assert_eq!(lines[0], "Jane Smith");
        assert!(lines.contains(&"SKILLS"));
        assert!(lines.contains(&"Python, Go, SQL"));
    }

    #[tokio::test]
    async fn collapses_whitespace_runs_inside_lines() {
        let bytes = testpdf::single_page(&["Jane    Smith", "Senior   Software     Engineer"]);
        let decoder = Decoder::new(policy());
        let doc = decoder.decode(bytes).await.unwrap();

        let report = Assembler::new(policy()).assemble(&doc).await.unwrap();
        assert!(report.text.contains("Jane Smith"));
        assert!(report.text.contains("Senior Software Engineer"));
    }

    #[tokio::test]
    async fn empty_document_yields_no_text_content() {
        let bytes = testpdf::single_page(&[]);
        let decoder = Decoder::new(policy());
        let doc = decoder.decode(bytes).await.unwrap();

        let err = Assembler::new(policy()).assemble(&doc).await.unwrap_err();
        assert_eq!(err.error_code(), "NO_TEXT_CONTENT");
    }

    #[tokio::test]
    async fn whole_document_pass_recovers_normalized_text() {
        let bytes = testpdf::single_page(&["Jane Smith", "jane.smith@example.com"]);
        let text = Assembler::new(policy())
            .whole_document_text(bytes)
            .await
            .unwrap();
        assert!(text.contains("Jane Smith"));
        assert!(text.contains("jane.smith@example.com"));
    }

    #[tokio::test]
    async fn whole_document_pass_on_garbage_is_unreadable() {
        let err = Assembler::new(policy())
            .whole_document_text(b"definitely not a pdf".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNREADABLE_STRUCTURE");
    }

    #[test]
    fn normalize_handles_unicode_spaces_and_blank_lines() {
        let text = "Jane\u{00A0}\u{00A0}Smith\n\n  \nSenior\u{2003}Engineer\n";
        assert_eq!(normalize_text(text), "Jane Smith\nSenior Engineer");
    }

    #[test]
    fn short_text_with_mostly_failed_pages_is_image_based() {
        let err = validate_assembly("tiny".to_string(), 1, 2, 50).unwrap_err();
        assert_eq!(err.error_code(), "LIKELY_IMAGE_BASED");
    }

    #[test]
    fn short_text_with_mostly_good_pages_is_accepted() {
        let report = validate_assembly("tiny".to_string(), 2, 1, 50).unwrap();
        assert_eq!(report.text, "tiny");
    }

    #[test]
    fn long_text_is_accepted_regardless_of_failed_pages() {
        let text = "x".repeat(200);
        let report = validate_assembly(text, 0, 5, 50).unwrap();
        assert_eq!(report.failed_pages, 5);
    }
}
