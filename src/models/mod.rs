pub mod file;
pub mod record;
pub mod response;
pub mod settings;

pub use file::SourceFile;
pub use record::{BatchOutcome, BatchStats, ExtractedFields, ExtractedRecord, RecordStatus};
pub use response::{ParseData, ParseResponse};
pub use settings::ExtractionSettings;
