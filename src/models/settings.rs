use serde::{Deserialize, Serialize};

/// Per-category extraction toggles. A disabled category is skipped entirely:
/// no patterns run, the output field stays absent, and no error is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub extract_name: bool,
    pub extract_email: bool,
    pub extract_phone: bool,
    pub extract_location: bool,
    pub extract_current_role: bool,
    pub extract_skills: bool,
    pub extract_education: bool,
    pub extract_experience: bool,
    pub extract_about: bool,
    pub extract_languages: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            extract_name: true,
            extract_email: true,
            extract_phone: true,
            extract_location: true,
            extract_current_role: true,
            extract_skills: true,
            extract_education: true,
            extract_experience: true,
            extract_about: true,
            extract_languages: true,
        }
    }
}

impl ExtractionSettings {
    pub fn all_disabled() -> Self {
        Self {
            extract_name: false,
            extract_email: false,
            extract_phone: false,
            extract_location: false,
            extract_current_role: false,
            extract_skills: false,
            extract_education: false,
            extract_experience: false,
            extract_about: false,
            extract_languages: false,
        }
    }
}
