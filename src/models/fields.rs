//! Structured fields extracted from a single document by the AI stage.
//!
//! Every free-text field is produced in the configured output language.
//! After a successful extraction, required fields hold either real content
//! or the explicit "insufficient information" sentinel — absence is never
//! represented by an empty string.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::i18n;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientName {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub facility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub value: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub patient: PatientName,
    /// Treatment date, preferring a date detected in the raw text over the
    /// AI-reported one.
    pub treatment_date: Option<NaiveDate>,
    /// The date string as reported by the AI, kept for auditing.
    pub ai_treatment_date: Option<String>,
    pub visit_type: String,
    pub provider: Provider,
    pub diagnoses: Vec<String>,
    pub treatments: Vec<String>,
    pub medications: Vec<Medication>,
    pub test_results: Vec<TestResult>,
    pub summary: String,
    pub primary_condition: String,
}

impl ExtractedFields {
    /// Replace empty text fields with the per-language sentinel so that
    /// downstream consumers always see "populated or explicitly unknown",
    /// never a silent omission.
    pub fn fill_missing_with_sentinel(&mut self, language: &str) {
        let sentinel = i18n::insufficient_information(language);
        for field in [
            &mut self.patient.first_name,
            &mut self.patient.last_name,
            &mut self.visit_type,
            &mut self.provider.name,
            &mut self.provider.facility,
            &mut self.summary,
            &mut self.primary_condition,
        ] {
            if field.trim().is_empty() {
                *field = sentinel.to_string();
            }
        }
        for med in &mut self.medications {
            for field in [&mut med.dosage, &mut med.frequency] {
                if field.trim().is_empty() {
                    *field = sentinel.to_string();
                }
            }
        }
        for test in &mut self.test_results {
            for field in [&mut test.value, &mut test.interpretation] {
                if field.trim().is_empty() {
                    *field = sentinel.to_string();
                }
            }
        }
    }
}
