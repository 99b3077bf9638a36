//! The versioned extraction schemas and their structural validation.
//!
//! One tagged field list is the single source of truth: it generates the
//! JSON function schema sent to the service and drives validation of the
//! response. The per-document and aggregate-summary schemas share the
//! machinery and differ only in shape.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Bumped whenever a field is added, removed, or retyped.
pub const SCHEMA_VERSION: &str = "v1";

/// Field type as exposed to the AI service and enforced on the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text (translated into the output language).
    Text,
    /// Ordered list of strings.
    TextList,
    /// Single object with fixed string-valued keys.
    Object { keys: &'static [&'static str] },
    /// Ordered list of objects; `required_keys` must be present and
    /// non-empty in every item.
    ObjectList {
        keys: &'static [&'static str],
        required_keys: &'static [&'static str],
    },
}

pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

/// Fields extracted from a single document.
pub const DOCUMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "patient",
        kind: FieldKind::Object {
            keys: &["first_name", "middle_name", "last_name"],
        },
        required: true,
        description: "Patient name as written in the document",
    },
    FieldSpec {
        name: "treatment_date",
        kind: FieldKind::Text,
        required: false,
        description: "Date of the visit or examination in YYYY-MM-DD format",
    },
    FieldSpec {
        name: "visit_type",
        kind: FieldKind::Text,
        required: true,
        description: "Type of visit or examination (e.g. cardiology consultation, blood test)",
    },
    FieldSpec {
        name: "provider",
        kind: FieldKind::Object {
            keys: &["name", "facility"],
        },
        required: true,
        description: "Treating professional and facility",
    },
    FieldSpec {
        name: "diagnoses",
        kind: FieldKind::TextList,
        required: false,
        description: "Diagnoses stated in the document, in order of appearance",
    },
    FieldSpec {
        name: "treatments",
        kind: FieldKind::TextList,
        required: false,
        description: "Treatments and procedures stated in the document",
    },
    FieldSpec {
        name: "medications",
        kind: FieldKind::ObjectList {
            keys: &["name", "dosage", "frequency"],
            required_keys: &["name"],
        },
        required: false,
        description: "Medications with dosage and frequency where stated",
    },
    FieldSpec {
        name: "test_results",
        kind: FieldKind::ObjectList {
            keys: &["name", "value", "interpretation"],
            required_keys: &["name"],
        },
        required: false,
        description: "Test results with values and interpretation where stated",
    },
    FieldSpec {
        name: "summary",
        kind: FieldKind::Text,
        required: true,
        description: "Concise summary of the visit or examination",
    },
    FieldSpec {
        name: "primary_condition",
        kind: FieldKind::Text,
        required: true,
        description: "The primary condition the document concerns",
    },
];

/// Fields of the cross-document aggregate summary.
pub const SUMMARY_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "patient_profile",
        kind: FieldKind::Text,
        required: true,
        description: "Short description of the patient across all records",
    },
    FieldSpec {
        name: "medical_history",
        kind: FieldKind::Text,
        required: true,
        description: "Comprehensive chronological medical history narrative",
    },
];

/// A function-calling schema as sent to the service.
#[derive(Debug, Clone)]
pub struct FunctionSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn document_function() -> FunctionSchema {
    FunctionSchema {
        name: "record_medical_document",
        description: "Record structured fields extracted from one medical document",
        parameters: parameters_for(DOCUMENT_FIELDS),
    }
}

pub fn summary_function() -> FunctionSchema {
    FunctionSchema {
        name: "record_medical_history_summary",
        description: "Record the aggregate medical history summary",
        parameters: parameters_for(SUMMARY_FIELDS),
    }
}

fn parameters_for(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), property_for(field));
    }
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();
    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

fn property_for(field: &FieldSpec) -> Value {
    match field.kind {
        FieldKind::Text => json!({
            "type": "string",
            "description": field.description,
        }),
        FieldKind::TextList => json!({
            "type": "array",
            "items": { "type": "string" },
            "description": field.description,
        }),
        FieldKind::Object { keys } => json!({
            "type": "object",
            "properties": string_properties(keys),
            "description": field.description,
        }),
        FieldKind::ObjectList { keys, required_keys } => json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": string_properties(keys),
                "required": required_keys,
            },
            "description": field.description,
        }),
    }
}

fn string_properties(keys: &[&str]) -> Value {
    let mut properties = Map::new();
    for key in keys {
        properties.insert(key.to_string(), json!({ "type": "string" }));
    }
    Value::Object(properties)
}

/// Ways a response can fail structural validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("required field `{0}` is missing or empty")]
    MissingRequired(&'static str),

    #[error("field `{field}` has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("item {index} of `{field}` is missing required key `{key}`")]
    MissingItemKey {
        field: &'static str,
        key: &'static str,
        index: usize,
    },
}

/// Validate a parsed response against a field schema. Sentinel text in a
/// required field is acceptable content — validation enforces *presence
/// and shape*, never inventing values.
pub fn validate(value: &Value, fields: &[FieldSpec]) -> Result<(), SchemaViolation> {
    let object = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

    for field in fields {
        let entry = match object.get(field.name) {
            Some(v) if !v.is_null() => v,
            _ => {
                if field.required {
                    return Err(SchemaViolation::MissingRequired(field.name));
                }
                continue;
            }
        };

        match field.kind {
            FieldKind::Text => {
                let text = entry.as_str().ok_or(SchemaViolation::WrongType {
                    field: field.name,
                    expected: "string",
                })?;
                if field.required && text.trim().is_empty() {
                    return Err(SchemaViolation::MissingRequired(field.name));
                }
            }
            FieldKind::TextList => {
                let items = entry.as_array().ok_or(SchemaViolation::WrongType {
                    field: field.name,
                    expected: "array of strings",
                })?;
                if items.iter().any(|i| !i.is_string()) {
                    return Err(SchemaViolation::WrongType {
                        field: field.name,
                        expected: "array of strings",
                    });
                }
            }
            FieldKind::Object { .. } => {
                if !entry.is_object() {
                    return Err(SchemaViolation::WrongType {
                        field: field.name,
                        expected: "object",
                    });
                }
            }
            FieldKind::ObjectList { required_keys, .. } => {
                let items = entry.as_array().ok_or(SchemaViolation::WrongType {
                    field: field.name,
                    expected: "array of objects",
                })?;
                for (index, item) in items.iter().enumerate() {
                    let item_object = item.as_object().ok_or(SchemaViolation::WrongType {
                        field: field.name,
                        expected: "array of objects",
                    })?;
                    for key in required_keys {
                        let present = item_object
                            .get(*key)
                            .and_then(|v| v.as_str())
                            .map(|s| !s.trim().is_empty())
                            .unwrap_or(false);
                        if !present {
                            return Err(SchemaViolation::MissingItemKey {
                                field: field.name,
                                key,
                                index,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_document() -> Value {
        json!({
            "patient": { "first_name": "Maria", "middle_name": "", "last_name": "Rossi" },
            "treatment_date": "2024-03-12",
            "visit_type": "Cardiology consultation",
            "provider": { "name": "Dr. Bianchi", "facility": "Ospedale San Carlo" },
            "diagnoses": ["Hypertension"],
            "treatments": [],
            "medications": [
                { "name": "Ramipril", "dosage": "5mg", "frequency": "once daily" }
            ],
            "test_results": [],
            "summary": "Routine cardiology follow-up, blood pressure controlled.",
            "primary_condition": "Hypertension"
        })
    }

    #[test]
    fn valid_response_passes() {
        assert_eq!(validate(&valid_document(), DOCUMENT_FIELDS), Ok(()));
    }

    #[test]
    fn missing_required_field_rejected() {
        let mut value = valid_document();
        value.as_object_mut().unwrap().remove("summary");
        assert_eq!(
            validate(&value, DOCUMENT_FIELDS),
            Err(SchemaViolation::MissingRequired("summary"))
        );
    }

    #[test]
    fn null_required_field_rejected() {
        let mut value = valid_document();
        value["visit_type"] = Value::Null;
        assert_eq!(
            validate(&value, DOCUMENT_FIELDS),
            Err(SchemaViolation::MissingRequired("visit_type"))
        );
    }

    #[test]
    fn empty_required_text_rejected() {
        let mut value = valid_document();
        value["primary_condition"] = json!("   ");
        assert_eq!(
            validate(&value, DOCUMENT_FIELDS),
            Err(SchemaViolation::MissingRequired("primary_condition"))
        );
    }

    #[test]
    fn sentinel_text_is_acceptable_content() {
        let mut value = valid_document();
        value["primary_condition"] = json!("Insufficient information");
        assert_eq!(validate(&value, DOCUMENT_FIELDS), Ok(()));
    }

    #[test]
    fn missing_optional_field_allowed() {
        let mut value = valid_document();
        value.as_object_mut().unwrap().remove("diagnoses");
        value.as_object_mut().unwrap().remove("treatment_date");
        assert_eq!(validate(&value, DOCUMENT_FIELDS), Ok(()));
    }

    #[test]
    fn wrong_list_type_rejected() {
        let mut value = valid_document();
        value["diagnoses"] = json!("not a list");
        assert!(matches!(
            validate(&value, DOCUMENT_FIELDS),
            Err(SchemaViolation::WrongType { field: "diagnoses", .. })
        ));
    }

    #[test]
    fn medication_without_name_rejected() {
        let mut value = valid_document();
        value["medications"] = json!([{ "dosage": "5mg" }]);
        assert_eq!(
            validate(&value, DOCUMENT_FIELDS),
            Err(SchemaViolation::MissingItemKey {
                field: "medications",
                key: "name",
                index: 0
            })
        );
    }

    #[test]
    fn non_object_response_rejected() {
        assert_eq!(
            validate(&json!(["a", "list"]), DOCUMENT_FIELDS),
            Err(SchemaViolation::NotAnObject)
        );
    }

    #[test]
    fn summary_schema_requires_both_fields() {
        let ok = json!({
            "patient_profile": "62-year-old patient with hypertension.",
            "medical_history": "Three cardiology visits over two years."
        });
        assert_eq!(validate(&ok, SUMMARY_FIELDS), Ok(()));

        let missing = json!({ "patient_profile": "..." });
        assert_eq!(
            validate(&missing, SUMMARY_FIELDS),
            Err(SchemaViolation::MissingRequired("medical_history"))
        );
    }

    #[test]
    fn generated_function_schema_lists_required_fields() {
        let function = document_function();
        let required = function.parameters["required"].as_array().unwrap();
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"patient"));
        assert!(names.contains(&"summary"));
        assert!(!names.contains(&"treatment_date"));
    }

    #[test]
    fn generated_properties_cover_every_field() {
        let function = document_function();
        let properties = function.parameters["properties"].as_object().unwrap();
        assert_eq!(properties.len(), DOCUMENT_FIELDS.len());
        assert_eq!(properties["medications"]["type"], "array");
        assert_eq!(
            properties["medications"]["items"]["required"],
            json!(["name"])
        );
    }
}
