//! Schema-constrained AI extraction.
//!
//! The pipeline sends raw document text plus a fixed, versioned field
//! schema to an external chat-completion service and validates the
//! response structurally before accepting it. Transient failures are
//! retried with exponential backoff; a response that does not conform to
//! the schema is retried once with a reformulated prompt, then treated as
//! terminal for that document.

pub mod client;
pub mod extractor;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use client::{ChatCompletionBackend, CompletionRequest, MockChatBackend, OpenAiClient};
pub use extractor::{AiSettings, StructuredExtractor};
pub use retry::{RetryPolicy, Sleep, ThreadSleep};

use thiserror::Error;

use self::schema::SchemaViolation;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("AI service unreachable at {0}")]
    Connection(String),

    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI service returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("response arguments are not valid JSON: {0}")]
    JsonParsing(String),

    #[error("response violates extraction schema {version}: {violation}")]
    Schema {
        version: &'static str,
        violation: SchemaViolation,
    },

    #[error("response carries no function call payload")]
    MissingFunctionCall,

    #[error("input text too short for extraction")]
    InputTooShort,
}

impl StructuringError {
    /// Transient failures worth retrying with backoff: connectivity,
    /// timeouts, rate limits, and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::HttpClient(_) => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Validation failures: the service answered, but not in the shape the
    /// schema demands.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::JsonParsing(_) | Self::Schema { .. } | Self::MissingFunctionCall
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(StructuringError::Service {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(StructuringError::Service {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(StructuringError::Timeout(60).is_transient());
    }

    #[test]
    fn client_errors_are_terminal() {
        let unauthorized = StructuringError::Service {
            status: 401,
            body: String::new(),
        };
        assert!(!unauthorized.is_transient());
        assert!(!unauthorized.is_validation());
    }

    #[test]
    fn schema_violations_are_validation_failures() {
        let err = StructuringError::Schema {
            version: schema::SCHEMA_VERSION,
            violation: SchemaViolation::MissingRequired("summary"),
        };
        assert!(err.is_validation());
        assert!(!err.is_transient());
    }
}
