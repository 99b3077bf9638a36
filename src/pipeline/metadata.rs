//! Metadata and identity synthesis: treatment-date detection in raw text
//! and deterministic filename assignment.
//!
//! Filenames come from a fixed template; collisions within a batch are
//! resolved by a monotonically increasing, zero-padded sequence number
//! scoped per template key. Sequence numbers are never reused in one run.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::i18n;
use crate::models::ExtractedFields;

/// Dates before this year are treated as noise (IDs, lot numbers, DOBs of
/// elderly patients) rather than treatment dates.
pub const MIN_TREATMENT_YEAR: i32 = 2015;

/// Placeholder for template fields the document did not yield.
pub const UNKNOWN_TOKEN: &str = "unknown";

fn word_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
        )
        .expect("word date pattern is valid")
    })
}

fn numeric_date_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\b\d{4}-\d{1,2}-\d{1,2}\b",
            r"\b\d{1,2}/\d{1,2}/\d{4}\b",
            r"\b\d{1,2}/\d{1,2}/\d{2}\b",
            r"\b\d{1,2}-\d{1,2}-\d{4}\b",
            r"\b\d{1,2}\.\d{1,2}\.\d{4}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("numeric date pattern is valid"))
        .collect()
    })
}

/// Find the first plausible treatment date in extracted text.
///
/// Word-form dates ("March 12, 2024") are tried first, then numeric forms,
/// parsed day-first for the slash/dot/dash styles common in European
/// records. Dates before `MIN_TREATMENT_YEAR` are ignored.
pub fn find_first_date_in_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    for m in word_date_pattern().find_iter(text) {
        let cleaned = m.as_str().replace(',', "");
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, "%B %d %Y") {
            if date.year() >= MIN_TREATMENT_YEAR {
                return Some(date);
            }
        }
    }

    for pattern in numeric_date_patterns() {
        for m in pattern.find_iter(text) {
            if let Some(date) = parse_numeric_date(m.as_str()) {
                if date.year() >= MIN_TREATMENT_YEAR {
                    return Some(date);
                }
            }
        }
    }
    None
}

/// Parse one numeric date match, day-first for ambiguous separators.
fn parse_numeric_date(raw: &str) -> Option<NaiveDate> {
    let formats: &[&str] = if raw.contains('-') && raw.len() >= 8 && raw[..4].chars().all(|c| c.is_ascii_digit()) {
        &["%Y-%m-%d"]
    } else if raw.contains('/') {
        &["%d/%m/%Y", "%d/%m/%y"]
    } else if raw.contains('.') {
        &["%d.%m.%Y"]
    } else {
        &["%d-%m-%Y"]
    };

    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Assigns canonical filenames for one batch.
///
/// The template may reference {patient_last}, {patient_initials},
/// {treatment_date}, {visit_type}, {provider_last}, and {seq}.
pub struct NameSynthesizer {
    template: String,
    assigned: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl NameSynthesizer {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            assigned: HashSet::new(),
            counters: HashMap::new(),
        }
    }

    /// Derive a filename (without extension) for one document's fields.
    /// Deterministic given the same fields and prior assignments.
    pub fn assign(&mut self, fields: &ExtractedFields) -> String {
        let rendered = self.render_without_seq(fields);
        let counter = self.counters.entry(rendered.clone()).or_insert(0);

        loop {
            *counter += 1;
            let candidate = rendered.replace("{seq}", &format!("{:03}", *counter));
            if self.assigned.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn render_without_seq(&self, fields: &ExtractedFields) -> String {
        let treatment_date = fields
            .treatment_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN_TOKEN.to_string());

        self.template
            .replace("{patient_last}", &slug_or_unknown(&fields.patient.last_name))
            .replace("{patient_initials}", &initials(fields))
            .replace("{treatment_date}", &treatment_date)
            .replace("{visit_type}", &slug_or_unknown(&fields.visit_type))
            .replace(
                "{provider_last}",
                &slug_or_unknown(last_word(&fields.provider.name)),
            )
    }
}

/// Lowercased, underscore-separated slug; sentinel or empty input maps to
/// the placeholder token.
fn slug_or_unknown(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || i18n::is_insufficient_sentinel(trimmed) {
        return UNKNOWN_TOKEN.to_string();
    }
    let slug: String = trimmed
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if slug.is_empty() {
        UNKNOWN_TOKEN.to_string()
    } else {
        slug
    }
}

fn last_word(text: &str) -> &str {
    text.split_whitespace().last().unwrap_or("")
}

fn initials(fields: &ExtractedFields) -> String {
    let parts = [
        &fields.patient.first_name,
        &fields.patient.middle_name,
        &fields.patient.last_name,
    ];
    let initials: String = parts
        .iter()
        .filter(|p| !p.trim().is_empty() && !i18n::is_insufficient_sentinel(p))
        .filter_map(|p| p.trim().chars().next())
        .flat_map(|c| c.to_lowercase())
        .collect();
    if initials.is_empty() {
        UNKNOWN_TOKEN.to_string()
    } else {
        initials
    }
}
