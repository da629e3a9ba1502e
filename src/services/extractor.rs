use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ExtractedFields, ExtractionSettings};

/// Applies the per-category pattern cascades to one normalized text blob.
/// Every category is independent; within a category the rules run in order
/// from most-specific to least-specific and the first accepted match wins.
/// The rule order is a behavioral contract: reordering changes output on
/// ambiguous inputs.
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str, settings: &ExtractionSettings) -> ExtractedFields {
        let mut fields = ExtractedFields::default();

        if settings.extract_name {
            if let Some((first, last)) = extract_name(text) {
                fields.first_name = Some(first);
                fields.last_name = last;
            }
        }
        if settings.extract_email {
            fields.email = extract_email(text);
        }
        if settings.extract_phone {
            fields.phone = extract_phone(text);
        }
        if settings.extract_location {
            fields.location = extract_location(text);
        }
        if settings.extract_current_role {
            fields.current_role = extract_current_role(text);
        }
        if settings.extract_skills {
            fields.skills = extract_skills(text);
        }
        if settings.extract_education {
            fields.education = extract_education(text);
        }
        if settings.extract_experience {
            fields.experience = extract_experience(text);
        }
        if settings.extract_about {
            fields.about = extract_about(text);
        }
        if settings.extract_languages {
            fields.languages = extract_languages(text);
        }

        fields
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// Category: name

static NAME_CAPITALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Z][a-z]+(?: [A-Z][a-z]+)+)").unwrap());
static NAME_LABELED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^name\s*:\s*(.+)$").unwrap());
static NAME_ALL_CAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([A-Z][A-Z ]+)$").unwrap());

fn extract_name(text: &str) -> Option<(String, Option<String>)> {
    let candidate = NAME_CAPITALIZED
        .captures(text)
        .or_else(|| NAME_LABELED.captures(text))
        .or_else(|| NAME_ALL_CAPS.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())?;

    let mut tokens = candidate.split_whitespace();
    let first = tokens.next()?.to_string();
    let rest = tokens.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() { None } else { Some(rest) };
    Some((first, last))
}

// Category: email

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

// Category: phone

static PHONE_NORTH_AMERICAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b").unwrap());
static PHONE_INTERNATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d{1,4}(?:[-. ()]{0,3}\d{2,4}){2,4}").unwrap());

fn extract_phone(text: &str) -> Option<String> {
    PHONE_NORTH_AMERICAN
        .find(text)
        .or_else(|| PHONE_INTERNATIONAL.find(text))
        .map(|m| m.as_str().trim().to_string())
}

// Category: location

static LOCATION_CITY_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z]+(?: [A-Z][a-zA-Z]+)*, ?[A-Z]{2}(?: \d{5}(?:-\d{4})?)?)\b")
        .unwrap()
});
static LOCATION_CITY_COUNTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z]+(?: [A-Z][a-zA-Z]+)*, [A-Z][a-z]+(?: [A-Z][a-z]+)*)\b").unwrap()
});
static LOCATION_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^location\s*:\s*(.+)$").unwrap());

fn extract_location(text: &str) -> Option<String> {
    if let Some(caps) = LOCATION_CITY_STATE.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim().to_string());
    }
    if let Some(caps) = LOCATION_CITY_COUNTRY.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim().to_string());
    }
    LOCATION_LABELED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

// Category: current role

/// Curated role-title patterns, tried in order: engineering, management,
/// analyst, design, consulting, executive.
static ROLE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:senior |junior |lead |principal |staff )?(?:software|data|devops|cloud|systems|security|machine learning|full[- ]stack|front[- ]end|back[- ]end|web|mobile|qa|embedded|platform) (?:engineer|developer|architect)\b",
        r"(?i)\b(?:senior )?(?:engineering|product|project|program|technical|it|operations|general) manager\b",
        r"(?i)\b(?:senior |junior |lead )?(?:data|business|financial|systems|security|research|marketing) (?:analyst|scientist)\b",
        r"(?i)\b(?:senior |lead )?(?:ux|ui|ux/ui|product|graphic|web|visual|interaction) designer\b",
        r"(?i)\b(?:senior |principal |management |it |strategy )?consultant\b",
        r"(?i)\b(?:chief (?:executive|technology|operating|financial|information|product) officer|vice president|co-founder|founder|ceo|cto|coo|cfo|cio)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn extract_current_role(text: &str) -> Option<String> {
    for rule in ROLE_RULES.iter() {
        if let Some(m) = rule.find(text) {
            return Some(m.as_str().trim().to_string());
        }
    }
    None
}

// Section-based categories

/// Heading-like line: 2+ uppercase letters/spaces, optional trailing colon.
/// A heuristic boundary, not a structural guarantee.
static HEADING_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z\s]+:?$").unwrap());

static SKILLS_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:technical\s+skills|core\s+competencies|programming\s+languages|technologies|skills)\s*(?::\s*(.*))?$").unwrap()
});
static EDUCATION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:academic\s+background|qualifications|education)\s*(?::\s*(.*))?$").unwrap()
});
static EXPERIENCE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:work\s+experience|professional\s+experience|employment\s+history|experience)\s*(?::\s*(.*))?$").unwrap()
});
static ABOUT_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:professional\s+summary|career\s+summary|about|summary|profile|objective)\s*(?::\s*(.*))?$").unwrap()
});
static LANGUAGES_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:language\s+skills|languages)\s*(?::\s*(.*))?$").unwrap()
});

/// Degree or institution phrases, matched line-wise and joined. The fallback
/// when no education heading exists.
static EDUCATION_DEGREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:bachelor(?:'s)?|master(?:'s)?|doctorate|ph\.?d\.?|b\.?s\.?c?\.?|m\.?s\.?c?\.?|m\.?b\.?a\.?|b\.?a\.?|m\.?a\.?|university|college|institute|academy)\b[^\n]*").unwrap()
});

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Finds a section introduced by the given heading and returns its lines:
/// any same-line remainder after a "Heading:" label, then every following
/// line until the next heading-like line or end of text. `None` when the
/// heading is absent or the section body is empty.
fn capture_section(text: &str, heading: &Regex) -> Option<Vec<String>> {
    let lines: Vec<&str> = text.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let caps = match heading.captures(trimmed) {
            Some(caps) => caps,
            None => continue,
        };

        let mut section: Vec<String> = Vec::new();
        if let Some(rest) = caps.get(1) {
            let rest = rest.as_str().trim();
            if !rest.is_empty() {
                section.push(rest.to_string());
            }
        }
        for following in &lines[idx + 1..] {
            let following = following.trim();
            if HEADING_BOUNDARY.is_match(following) {
                break;
            }
            if !following.is_empty() {
                section.push(following.to_string());
            }
        }

        if !section.is_empty() {
            return Some(section);
        }
    }
    None
}

/// Splits a section into list entries on comma/newline/bullet separators,
/// strips leading bullet and dash characters, and drops empty tokens.
fn split_list(lines: &[String], drop_numeric: bool, strip_parentheticals: bool, cap: usize) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split(['\n', ',', '•', '●', '▪', '·']))
        .map(|token| {
            let token = if strip_parentheticals {
                PARENTHETICAL.replace_all(token, "").to_string()
            } else {
                token.to_string()
            };
            token
                .trim()
                .trim_start_matches(['-', '*', '•', '●', '▪', '·', '‣'])
                .trim()
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .filter(|token| !drop_numeric || !token.chars().all(|c| c.is_ascii_digit()))
        .take(cap)
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn extract_skills(text: &str) -> Option<Vec<String>> {
    let section = capture_section(text, &SKILLS_HEADING)?;
    let skills = split_list(&section, true, false, 20);
    if skills.is_empty() {
        None
    } else {
        Some(skills)
    }
}

fn extract_education(text: &str) -> Option<String> {
    if let Some(section) = capture_section(text, &EDUCATION_HEADING) {
        return Some(section.join(" "));
    }

    let degrees: Vec<String> = EDUCATION_DEGREE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect();
    if degrees.is_empty() {
        None
    } else {
        Some(degrees.join("; "))
    }
}

fn extract_experience(text: &str) -> Option<String> {
    let section = capture_section(text, &EXPERIENCE_HEADING)?;
    let experience = truncate_chars(&section.join(" "), 500);
    if experience.chars().count() > 10 {
        Some(experience)
    } else {
        None
    }
}

fn extract_about(text: &str) -> Option<String> {
    let section = capture_section(text, &ABOUT_HEADING)?;
    let about = truncate_chars(&section.join(" "), 300);
    if about.chars().count() > 10 {
        Some(about)
    } else {
        None
    }
}

fn extract_languages(text: &str) -> Option<Vec<String>> {
    let section = capture_section(text, &LANGUAGES_HEADING)?;
    let languages = split_list(&section, false, true, 10);
    if languages.is_empty() {
        None
    } else {
        Some(languages)
    }
}
