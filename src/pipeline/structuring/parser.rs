//! Conversion of validated response JSON into typed extraction results.
//!
//! Validation has already enforced presence and shape of required fields;
//! conversion is lenient everywhere else, in the spirit of "take what the
//! service gave us, drop what does not fit".

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{
    AggregateSummary, ExtractedFields, Medication, PatientName, Provider, TestResult,
};

/// Build `ExtractedFields` from a schema-validated document response.
pub fn fields_from_value(value: &Value) -> ExtractedFields {
    let ai_treatment_date = text(value, "treatment_date");
    let treatment_date = ai_treatment_date
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());

    ExtractedFields {
        patient: PatientName {
            first_name: nested_text(value, "patient", "first_name"),
            middle_name: nested_text(value, "patient", "middle_name"),
            last_name: nested_text(value, "patient", "last_name"),
        },
        treatment_date,
        ai_treatment_date,
        visit_type: text(value, "visit_type").unwrap_or_default(),
        provider: Provider {
            name: nested_text(value, "provider", "name"),
            facility: nested_text(value, "provider", "facility"),
        },
        diagnoses: text_list(value, "diagnoses"),
        treatments: text_list(value, "treatments"),
        medications: medications(value),
        test_results: test_results(value),
        summary: text(value, "summary").unwrap_or_default(),
        primary_condition: text(value, "primary_condition").unwrap_or_default(),
    }
}

/// Build an `AggregateSummary` from a schema-validated summary response.
pub fn summary_from_value(value: &Value) -> AggregateSummary {
    AggregateSummary {
        patient_profile: text(value, "patient_profile").unwrap_or_default(),
        medical_history: text(value, "medical_history").unwrap_or_default(),
        available: true,
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn nested_text(value: &Value, key: &str, inner: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.get(inner))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn text_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn medications(value: &Value) -> Vec<Medication> {
    value
        .get("medications")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    Some(Medication {
                        name,
                        dosage: item_text(item, "dosage"),
                        frequency: item_text(item, "frequency"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn test_results(value: &Value) -> Vec<TestResult> {
    value
        .get("test_results")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    Some(TestResult {
                        name,
                        value: item_text(item, "value"),
                        interpretation: item_text(item, "interpretation"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn item_text(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_document_round_trip() {
        let value = json!({
            "patient": { "first_name": "Maria", "middle_name": "", "last_name": "Rossi" },
            "treatment_date": "2024-03-12",
            "visit_type": "Cardiology consultation",
            "provider": { "name": "Dr. Bianchi", "facility": "Ospedale San Carlo" },
            "diagnoses": ["Hypertension (ipertensione)"],
            "treatments": ["Lifestyle counselling"],
            "medications": [
                { "name": "Ramipril", "dosage": "5mg", "frequency": "once daily" }
            ],
            "test_results": [
                { "name": "Blood pressure", "value": "135/85", "interpretation": "borderline" }
            ],
            "summary": "Follow-up, pressure borderline.",
            "primary_condition": "Hypertension"
        });

        let fields = fields_from_value(&value);
        assert_eq!(fields.patient.last_name, "Rossi");
        assert_eq!(
            fields.treatment_date,
            NaiveDate::from_ymd_opt(2024, 3, 12)
        );
        assert_eq!(fields.ai_treatment_date.as_deref(), Some("2024-03-12"));
        assert_eq!(fields.medications.len(), 1);
        assert_eq!(fields.medications[0].dosage, "5mg");
        assert_eq!(fields.test_results[0].value, "135/85");
    }

    #[test]
    fn unparseable_date_kept_as_raw_string_only() {
        let value = json!({ "treatment_date": "spring of 2024", "summary": "s" });
        let fields = fields_from_value(&value);
        assert!(fields.treatment_date.is_none());
        assert_eq!(fields.ai_treatment_date.as_deref(), Some("spring of 2024"));
    }

    #[test]
    fn medication_items_without_name_are_dropped() {
        let value = json!({
            "medications": [
                { "dosage": "5mg" },
                { "name": "Metformin" }
            ]
        });
        let fields = fields_from_value(&value);
        assert_eq!(fields.medications.len(), 1);
        assert_eq!(fields.medications[0].name, "Metformin");
        assert_eq!(fields.medications[0].dosage, "");
    }

    #[test]
    fn empty_list_entries_filtered() {
        let value = json!({ "diagnoses": ["", "Diabetes", "  "] });
        let fields = fields_from_value(&value);
        assert_eq!(fields.diagnoses, vec!["Diabetes"]);
    }

    #[test]
    fn summary_conversion() {
        let value = json!({
            "patient_profile": "62-year-old patient.",
            "medical_history": "Two visits in 2024."
        });
        let summary = summary_from_value(&value);
        assert!(summary.available);
        assert_eq!(summary.patient_profile, "62-year-old patient.");
    }
}
