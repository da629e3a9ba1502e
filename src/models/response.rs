use serde::{Deserialize, Serialize};

use super::record::{BatchStats, ExtractedRecord};

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub data: ParseData,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseData {
    pub records: Vec<ExtractedRecord>,
    pub stats: BatchStats,
    pub log: Vec<String>,
}

impl ParseResponse {
    pub fn new(
        records: Vec<ExtractedRecord>,
        stats: BatchStats,
        log: Vec<String>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            success: true,
            data: ParseData {
                records,
                stats,
                log,
            },
            processing_time_ms,
        }
    }
}
