pub mod assembler;
pub mod batch;
pub mod decoder;
pub mod export;
pub mod extractor;
pub mod testpdf;

pub use batch::{BatchProcessor, ProgressCallback};
pub use export::CsvExporter;
pub use extractor::FieldExtractor;
