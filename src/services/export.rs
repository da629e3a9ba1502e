use csv::{QuoteStyle, WriterBuilder};

use crate::error::{AppError, AppResult};
use crate::models::{BatchStats, ExtractedRecord, RecordStatus};

const COLUMNS: [&str; 13] = [
    "filename",
    "firstName",
    "lastName",
    "email",
    "phone",
    "location",
    "currentRole",
    "skills",
    "education",
    "experience",
    "about",
    "languages",
    "status",
];

/// Renders extracted records as CSV: one row per record in batch order,
/// every field quoted, absent values as empty strings, list fields joined
/// with "; ".
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, records: &[ExtractedRecord]) -> AppResult<String> {
        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(vec![]);

        writer
            .write_record(COLUMNS)
            .map_err(|e| AppError::internal(format!("CSV write failed: {}", e)))?;

        for record in records {
            let fields = &record.fields;
            let status = match record.status {
                RecordStatus::Success => "success",
                RecordStatus::Error => "error",
            };
            let skills = fields
                .skills
                .as_ref()
                .map(|s| s.join("; "))
                .unwrap_or_default();
            let languages = fields
                .languages
                .as_ref()
                .map(|l| l.join("; "))
                .unwrap_or_default();
            let row: [&str; 13] = [
                record.filename.as_str(),
                fields.first_name.as_deref().unwrap_or(""),
                fields.last_name.as_deref().unwrap_or(""),
                fields.email.as_deref().unwrap_or(""),
                fields.phone.as_deref().unwrap_or(""),
                fields.location.as_deref().unwrap_or(""),
                fields.current_role.as_deref().unwrap_or(""),
                skills.as_str(),
                fields.education.as_deref().unwrap_or(""),
                fields.experience.as_deref().unwrap_or(""),
                fields.about.as_deref().unwrap_or(""),
                languages.as_str(),
                status,
            ];
            writer
                .write_record(row)
                .map_err(|e| AppError::internal(format!("CSV write failed: {}", e)))?;
        }

        finish(writer)
    }

    /// Records table followed by a blank line and a summary section with the
    /// run counters, the success rate, and the export timestamp.
    pub fn render_with_summary(
        &self,
        records: &[ExtractedRecord],
        stats: &BatchStats,
    ) -> AppResult<String> {
        let table = self.render(records)?;

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(vec![]);
        let rows = [
            ("Total", stats.total.to_string()),
            ("Successful", stats.successful.to_string()),
            ("Failed", stats.failed.to_string()),
            ("Success Rate", format!("{:.1}%", stats.success_rate())),
            ("Exported At", chrono::Utc::now().to_rfc3339()),
        ];
        for (label, value) in rows {
            writer
                .write_record([label, value.as_str()])
                .map_err(|e| AppError::internal(format!("CSV write failed: {}", e)))?;
        }

        Ok(format!("{}\n{}", table, finish(writer)?))
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> AppResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::internal(format!("CSV encoding failed: {}", e)))
}
