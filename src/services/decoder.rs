use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use once_cell::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PipelinePolicy;
use crate::error::{AppError, AppResult};

/// Page-structured result of one structural decode. Page numbers are capped
/// at decode time; text fragments are fetched lazily per page. The decoded
/// structures live behind an `Arc`, so dropping the last clone releases them
/// even when an abandoned worker still holds one.
#[derive(Clone, Debug)]
pub struct DecodedDocument {
    doc: Arc<Document>,
    pages: Vec<u32>,
    total_pages: usize,
}

impl DecodedDocument {
    /// Pages within the cap, in document order.
    pub fn page_numbers(&self) -> &[u32] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page count before the cap was applied.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Text fragments of one page: the page's text content split into lines.
    /// A structural failure inside the page surfaces as `PageExtraction`,
    /// which callers absorb without failing the document.
    pub fn page_fragments(&self, page_number: u32) -> AppResult<Vec<String>> {
        let text = self
            .doc
            .extract_text(&[page_number])
            .map_err(|e| AppError::PageExtraction {
                page: page_number,
                message: e.to_string(),
            })?;
        Ok(text.lines().map(str::to_string).collect())
    }
}

pub struct Decoder {
    policy: PipelinePolicy,
}

impl Decoder {
    pub fn new(policy: PipelinePolicy) -> Self {
        Self { policy }
    }

    /// Structural decode of a presumed-PDF byte buffer. Empty and oversized
    /// input is rejected before any content is read. The decode itself runs
    /// on a blocking worker under the decode budget; a worker abandoned by
    /// the timeout finishes in the background and drops its document there.
    pub async fn decode(&self, bytes: Vec<u8>) -> AppResult<DecodedDocument> {
        if bytes.is_empty() {
            return Err(AppError::EmptyFile);
        }
        if bytes.len() > self.policy.max_file_size_bytes() {
            return Err(AppError::FileTooLarge {
                size: bytes.len().div_ceil(1024 * 1024),
                limit: self.policy.max_file_size_mb,
            });
        }

        let decode_budget = self.policy.decode_timeout();
        let handle = tokio::task::spawn_blocking(move || Document::load_mem(&bytes));

        let doc = match timeout(decode_budget, handle).await {
            Ok(Ok(Ok(doc))) => doc,
            Ok(Ok(Err(e))) => {
                warn!("PDF structural decode failed: {}", e);
                return Err(AppError::unreadable(e.to_string()));
            }
            Ok(Err(e)) => {
                return Err(AppError::internal(format!("Decode worker failed: {}", e)));
            }
            Err(_) => {
                warn!(
                    "PDF decode exceeded its {}s budget",
                    self.policy.decode_timeout_seconds
                );
                return Err(AppError::DecodeTimeout {
                    seconds: self.policy.decode_timeout_seconds,
                });
            }
        };

        let all_pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total_pages = all_pages.len();
        let pages: Vec<u32> = all_pages.into_iter().take(self.policy.max_pages).collect();

        if pages.len() < total_pages {
            debug!(
                "Page cap applied: decoding {} of {} pages",
                pages.len(),
                total_pages
            );
        }

        Ok(DecodedDocument {
            doc: Arc::new(doc),
            pages,
            total_pages,
        })
    }
}

static DECODER_READY: OnceCell<bool> = OnceCell::new();

/// Idempotent one-time readiness probe: builds a minimal in-memory document
/// and runs it through the decode path once, memoizing the verdict for the
/// life of the process.
pub fn ensure_ready() -> bool {
    *DECODER_READY.get_or_init(|| match probe() {
        Ok(()) => {
            info!("Decoder readiness probe succeeded");
            true
        }
        Err(e) => {
            warn!("Decoder readiness probe failed: {}", e);
            false
        }
    })
}

fn probe() -> AppResult<()> {
    let bytes = build_minimal_pdf("decoder readiness probe")?;
    let doc = Document::load_mem(&bytes).map_err(|e| AppError::unreadable(e.to_string()))?;
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(AppError::internal("Probe document has no pages"));
    }
    let text = doc
        .extract_text(&[1])
        .map_err(|e| AppError::internal(format!("Probe text extraction failed: {}", e)))?;
    if text.trim().is_empty() {
        return Err(AppError::internal("Probe document yielded no text"));
    }
    Ok(())
}

fn build_minimal_pdf(line: &str) -> AppResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![50.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| AppError::internal(format!("Probe content encoding failed: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::internal(format!("Probe document write failed: {}", e)))?;
    Ok(bytes)
}

/// Stream-marker heuristic for scanned documents: counts image markers
/// against text markers over the raw bytes. Used to enrich diagnostics only,
/// never to change classification.
pub fn looks_image_based(pdf_data: &[u8]) -> bool {
    let pdf_str = String::from_utf8_lossy(pdf_data);

    let image_markers = [
        "/Image",
        "/DCTDecode",      // JPEG compression
        "/CCITTFaxDecode", // Fax/scan compression
        "/JBIG2Decode",    // JBIG2 compression (common in scans)
        "/JPXDecode",      // JPEG2000
    ];
    let image_count = image_markers
        .iter()
        .map(|marker| pdf_str.matches(marker).count())
        .sum::<usize>();

    let text_markers = [
        "/Font",
        "/Text",
        "BT", // Begin text
        "ET", // End text
    ];
    let text_count = text_markers
        .iter()
        .map(|marker| pdf_str.matches(marker).count())
        .sum::<usize>();

    debug!(
        "PDF analysis: {} image markers, {} text markers",
        image_count, text_count
    );

    image_count > 0 && (text_count == 0 || image_count > text_count * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testpdf::build_pdf;

    fn policy() -> PipelinePolicy {
        PipelinePolicy::default()
    }

    #[tokio::test]
    async fn decodes_pages_and_fragments() {
        let bytes = build_pdf(&[&["Jane Smith", "Software Engineer"], &["Second page"]]);
        let decoder = Decoder::new(policy());
        let doc = decoder.decode(bytes).await.unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.total_pages(), 2);

        let fragments = doc.page_fragments(doc.page_numbers()[0]).unwrap();
        assert!(fragments.iter().any(|f| f.contains("Jane Smith")));
        assert!(fragments.iter().any(|f| f.contains("Software Engineer")));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_decode() {
        let decoder = Decoder::new(policy());
        let err = decoder.decode(Vec::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_FILE");
    }

    #[tokio::test]
    async fn oversized_input_is_rejected_before_decode() {
        let mut small = policy();
        small.max_file_size_mb = 1;
        let decoder = Decoder::new(small);
        let err = decoder.decode(vec![0u8; 2 * 1024 * 1024]).await.unwrap_err();
        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
    }

    #[tokio::test]
    async fn garbage_input_is_unreadable() {
        let decoder = Decoder::new(policy());
        let err = decoder
            .decode(b"definitely not a pdf at all".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNREADABLE_STRUCTURE");
    }

    #[tokio::test]
    async fn page_cap_truncates_but_records_total() {
        let bytes = build_pdf(&[&["one"], &["two"], &["three"]]);
        let mut capped = policy();
        capped.max_pages = 2;
        let decoder = Decoder::new(capped);
        let doc = decoder.decode(bytes).await.unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.total_pages(), 3);
    }

    #[test]
    fn readiness_probe_succeeds_and_memoizes() {
        assert!(ensure_ready());
        assert!(ensure_ready());
    }

    #[test]
    fn image_marker_heuristic() {
        let scanned = b"%PDF-1.4 /Image /DCTDecode /Image /DCTDecode /Image";
        assert!(looks_image_based(scanned));

        let textual = build_pdf(&[&["plain text resume"]]);
        assert!(!looks_image_based(&textual));
    }
}
