use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Error,
}

/// Field-level output of one extraction pass. Every field is optional; a
/// category that did not match, or whose toggle was off, stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

impl ExtractedFields {
    /// Content-quality gate: a record counts as recognizable CV data when it
    /// carries at least one identity signal (first name, email, phone) or at
    /// least one substance signal (non-empty skills, current role,
    /// experience). Anything below that is demoted to an error record.
    pub fn has_recognizable_content(&self) -> bool {
        let has_identity =
            self.first_name.is_some() || self.email.is_some() || self.phone.is_some();
        let has_substance = self
            .skills
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
            || self.current_role.is_some()
            || self.experience.is_some();
        has_identity || has_substance
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub filename: String,
    #[serde(flatten)]
    pub fields: ExtractedFields,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExtractedRecord {
    pub fn success(filename: String, fields: ExtractedFields) -> Self {
        Self {
            filename,
            fields,
            status: RecordStatus::Success,
            error_message: None,
        }
    }

    /// Error records keep whatever fields were assigned before the failure
    /// was declared; callers pass `ExtractedFields::default()` when nothing
    /// was extracted.
    pub fn failure(filename: String, fields: ExtractedFields, message: String) -> Self {
        Self {
            filename,
            fields,
            status: RecordStatus::Error,
            error_message: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

/// Run-level counters. All counters are monotonic non-decreasing across one
/// batch; `current_file` is set before each file and cleared after the last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

impl BatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn start_file(&mut self, name: &str) {
        self.current_file = Some(name.to_string());
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.successful += 1;
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn clear_current_file(&mut self) {
        self.current_file = None;
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.successful as f64 * 100.0 / self.processed as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub records: Vec<ExtractedRecord>,
    pub stats: BatchStats,
    pub log: Vec<String>,
    pub elapsed_ms: u64,
}
