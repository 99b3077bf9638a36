//! The structured-extraction client: call → validate → retry.
//!
//! Two retry regimes, both bounded and visible:
//! - transient failures (connectivity, timeouts, rate limits, 5xx) retry
//!   up to `RetryPolicy::max_retries` with exponential backoff;
//! - schema-nonconforming responses get exactly one reformulated retry,
//!   then the error is terminal for the document. The client never
//!   fabricates a value to paper over a bad response.

use serde_json::Value;

use super::client::{ChatCompletionBackend, CompletionRequest};
use super::parser;
use super::prompt;
use super::retry::{RetryPolicy, Sleep, ThreadSleep};
use super::schema::{self, FieldSpec, FunctionSchema};
use super::StructuringError;
use crate::models::{AggregateSummary, ExtractedFields};

/// Inputs below this length are rejected before spending an AI call.
const MIN_INPUT_LENGTH: usize = 10;

/// Settings for both extraction calls.
#[derive(Debug, Clone)]
pub struct AiSettings {
    pub model: String,
    pub aggregate_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub output_language: String,
    /// Role prompt override; the built-in default is used when None.
    pub role_prompt: Option<String>,
    pub aggregate_role_prompt: Option<String>,
}

pub struct StructuredExtractor {
    backend: Box<dyn ChatCompletionBackend>,
    policy: RetryPolicy,
    sleep: Box<dyn Sleep>,
    settings: AiSettings,
}

impl StructuredExtractor {
    pub fn new(backend: Box<dyn ChatCompletionBackend>, policy: RetryPolicy, settings: AiSettings) -> Self {
        Self {
            backend,
            policy,
            sleep: Box::new(ThreadSleep),
            settings,
        }
    }

    /// Swap in a fake sleeper for tests.
    pub fn with_sleep(mut self, sleep: Box<dyn Sleep>) -> Self {
        self.sleep = sleep;
        self
    }

    /// Extract structured fields from one document's raw text.
    pub fn extract_document_fields(
        &self,
        raw_text: &str,
    ) -> Result<ExtractedFields, StructuringError> {
        if raw_text.trim().len() < MIN_INPUT_LENGTH {
            return Err(StructuringError::InputTooShort);
        }

        let system = self
            .settings
            .role_prompt
            .clone()
            .unwrap_or_else(|| prompt::default_role_prompt(&self.settings.output_language));
        let user = prompt::build_document_prompt(raw_text);
        let function = schema::document_function();

        let value = self.call_validated(
            &self.settings.model,
            &system,
            &user,
            schema::DOCUMENT_FIELDS,
            &function,
        )?;

        let mut fields = parser::fields_from_value(&value);
        fields.fill_missing_with_sentinel(&self.settings.output_language);
        Ok(fields)
    }

    /// Produce the cross-document aggregate summary from the combined
    /// visit history.
    pub fn summarize_history(&self, history: &str) -> Result<AggregateSummary, StructuringError> {
        if history.trim().len() < MIN_INPUT_LENGTH {
            return Err(StructuringError::InputTooShort);
        }

        let system = self
            .settings
            .aggregate_role_prompt
            .clone()
            .unwrap_or_else(|| prompt::default_summary_role_prompt(&self.settings.output_language));
        let user = prompt::build_summary_prompt(history);
        let function = schema::summary_function();

        let value = self.call_validated(
            &self.settings.aggregate_model,
            &system,
            &user,
            schema::SUMMARY_FIELDS,
            &function,
        )?;

        Ok(parser::summary_from_value(&value))
    }

    /// Call the backend until a response passes structural validation or
    /// the retry bounds are exhausted.
    fn call_validated(
        &self,
        model: &str,
        system: &str,
        user: &str,
        fields: &[FieldSpec],
        function: &FunctionSchema,
    ) -> Result<Value, StructuringError> {
        let mut prompt_text = user.to_string();
        let mut transient_attempts = 0u32;
        let mut reformulated = false;

        loop {
            let request = CompletionRequest {
                model,
                system_prompt: system,
                user_prompt: &prompt_text,
                function,
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            };

            let error = match self.backend.complete(&request) {
                Ok(arguments) => match self.validate_arguments(&arguments, fields) {
                    Ok(value) => return Ok(value),
                    Err(e) => e,
                },
                Err(e) => e,
            };

            if error.is_transient() && transient_attempts < self.policy.max_retries {
                let delay = self.policy.delay_for(transient_attempts);
                transient_attempts += 1;
                tracing::warn!(
                    attempt = transient_attempts,
                    max = self.policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient AI failure, backing off"
                );
                self.sleep.sleep(delay);
                continue;
            }

            if error.is_validation() && !reformulated {
                reformulated = true;
                prompt_text.push_str(prompt::strict_retry_note());
                tracing::warn!(
                    error = %error,
                    "Response failed schema validation, retrying once reformulated"
                );
                continue;
            }

            return Err(error);
        }
    }

    fn validate_arguments(
        &self,
        arguments: &str,
        fields: &[FieldSpec],
    ) -> Result<Value, StructuringError> {
        let value: Value = serde_json::from_str(arguments)
            .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;
        schema::validate(&value, fields).map_err(|violation| StructuringError::Schema {
            version: schema::SCHEMA_VERSION,
            violation,
        })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::structuring::client::MockChatBackend;
    use crate::pipeline::structuring::retry::RecordingSleep;

    fn settings() -> AiSettings {
        AiSettings {
            model: "gpt-4o-mini".to_string(),
            aggregate_model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.1,
            output_language: "en".to_string(),
            role_prompt: None,
            aggregate_role_prompt: None,
        }
    }

    fn valid_arguments() -> String {
        serde_json::json!({
            "patient": { "first_name": "Maria", "middle_name": "", "last_name": "Rossi" },
            "treatment_date": "2024-03-12",
            "visit_type": "Cardiology consultation",
            "provider": { "name": "Dr. Bianchi", "facility": "Ospedale San Carlo" },
            "diagnoses": ["Hypertension"],
            "treatments": [],
            "medications": [],
            "test_results": [],
            "summary": "Routine follow-up.",
            "primary_condition": "Hypertension"
        })
        .to_string()
    }

    /// Arguments missing the required `summary` field.
    fn nonconforming_arguments() -> String {
        serde_json::json!({
            "patient": { "first_name": "Maria", "last_name": "Rossi" },
            "visit_type": "Consultation",
            "provider": { "name": "Dr. Bianchi", "facility": "" },
            "primary_condition": "Hypertension"
        })
        .to_string()
    }

    fn extractor(backend: MockChatBackend) -> (StructuredExtractor, std::sync::Arc<RecordingSleep>) {
        let sleep = std::sync::Arc::new(RecordingSleep::default());
        struct SharedSleep(std::sync::Arc<RecordingSleep>);
        impl Sleep for SharedSleep {
            fn sleep(&self, duration: Duration) {
                self.0.sleep(duration);
            }
        }
        let extractor = StructuredExtractor::new(
            Box::new(backend),
            RetryPolicy::new(3, Duration::from_millis(500)),
            settings(),
        )
        .with_sleep(Box::new(SharedSleep(sleep.clone())));
        (extractor, sleep)
    }

    const RAW_TEXT: &str = "Visita cardiologica, paziente Maria Rossi, 12/03/2024.";

    #[test]
    fn valid_response_parses_into_fields() {
        let (extractor, _) = extractor(MockChatBackend::new(&valid_arguments()));
        let fields = extractor.extract_document_fields(RAW_TEXT).unwrap();
        assert_eq!(fields.patient.last_name, "Rossi");
        assert_eq!(fields.summary, "Routine follow-up.");
    }

    #[test]
    fn transient_failures_retry_with_exponential_backoff() {
        let backend = MockChatBackend::new(&valid_arguments())
            .enqueue(Err(StructuringError::Timeout(60)))
            .enqueue(Err(StructuringError::Service {
                status: 429,
                body: "rate limited".to_string(),
            }));
        let (extractor, sleep) = extractor(backend);

        let fields = extractor.extract_document_fields(RAW_TEXT).unwrap();
        assert_eq!(fields.visit_type, "Cardiology consultation");

        let delays = sleep.delays.lock().unwrap();
        assert_eq!(
            *delays,
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn transient_retries_are_bounded() {
        let backend = MockChatBackend::new("unused")
            .enqueue(Err(StructuringError::Timeout(60)))
            .enqueue(Err(StructuringError::Timeout(60)))
            .enqueue(Err(StructuringError::Timeout(60)))
            .enqueue(Err(StructuringError::Timeout(60)));
        let (extractor, sleep) = extractor(backend);

        let result = extractor.extract_document_fields(RAW_TEXT);
        assert!(matches!(result, Err(StructuringError::Timeout(_))));
        // max_retries = 3 → exactly 3 backoff sleeps before giving up
        assert_eq!(sleep.delays.lock().unwrap().len(), 3);
    }

    #[test]
    fn nonconforming_response_retried_once_then_terminal() {
        // Every response misses a required field: one reformulated retry,
        // then the schema error is surfaced — never silently finalized.
        let backend = MockChatBackend::new(&nonconforming_arguments());
        let (extractor, _) = extractor(backend);

        let result = extractor.extract_document_fields(RAW_TEXT);
        match result {
            Err(StructuringError::Schema { violation, .. }) => {
                assert_eq!(
                    violation,
                    schema::SchemaViolation::MissingRequired("summary")
                );
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn nonconforming_then_valid_recovers() {
        let backend = MockChatBackend::new(&valid_arguments())
            .enqueue(Ok(nonconforming_arguments()));
        let (extractor, _) = extractor(backend);

        let fields = extractor.extract_document_fields(RAW_TEXT).unwrap();
        assert_eq!(fields.primary_condition, "Hypertension");
    }

    #[test]
    fn malformed_json_counts_as_validation_failure() {
        let backend = MockChatBackend::new(&valid_arguments())
            .enqueue(Ok("not json at all".to_string()));
        let (extractor, _) = extractor(backend);

        // One reformulated retry recovers with the valid default.
        let fields = extractor.extract_document_fields(RAW_TEXT).unwrap();
        assert_eq!(fields.patient.first_name, "Maria");
    }

    #[test]
    fn terminal_service_error_not_retried() {
        let backend = MockChatBackend::new(&valid_arguments()).enqueue(Err(
            StructuringError::Service {
                status: 401,
                body: "bad key".to_string(),
            },
        ));
        let (extractor, sleep) = extractor(backend);

        let result = extractor.extract_document_fields(RAW_TEXT);
        assert!(matches!(
            result,
            Err(StructuringError::Service { status: 401, .. })
        ));
        assert!(sleep.delays.lock().unwrap().is_empty());
    }

    #[test]
    fn short_input_rejected_without_an_ai_call() {
        let backend = MockChatBackend::new(&valid_arguments());
        let (extractor, _) = extractor(backend);
        let result = extractor.extract_document_fields("   x   ");
        assert!(matches!(result, Err(StructuringError::InputTooShort)));
    }

    #[test]
    fn missing_fields_filled_with_sentinel_after_success() {
        // Valid per schema but with an empty optional medication dosage.
        let arguments = serde_json::json!({
            "patient": { "first_name": "Maria", "middle_name": "", "last_name": "Rossi" },
            "visit_type": "Consultation",
            "provider": { "name": "Dr. Bianchi", "facility": "" },
            "medications": [ { "name": "Ramipril" } ],
            "summary": "Short visit.",
            "primary_condition": "Hypertension"
        })
        .to_string();
        let (extractor, _) = extractor(MockChatBackend::new(&arguments));

        let fields = extractor.extract_document_fields(RAW_TEXT).unwrap();
        assert_eq!(fields.provider.facility, "Insufficient information");
        assert_eq!(fields.medications[0].dosage, "Insufficient information");
    }

    #[test]
    fn summarize_history_uses_summary_schema() {
        let arguments = serde_json::json!({
            "patient_profile": "62-year-old patient with hypertension.",
            "medical_history": "Two cardiology visits in 2024."
        })
        .to_string();
        let (extractor, _) = extractor(MockChatBackend::new(&arguments));

        let summary = extractor
            .summarize_history("Date: 2024-03-12, Visit: cardiology ...")
            .unwrap();
        assert!(summary.available);
        assert!(summary.medical_history.contains("2024"));
    }
}
