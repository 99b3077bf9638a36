//! HTTP client for the structured-extraction service.
//!
//! Speaks the OpenAI-compatible chat-completions protocol with function
//! calling: the request carries the field schema, and the response's
//! function-call arguments are the structured payload. A trait seam keeps
//! the pipeline testable without the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::schema::FunctionSchema;
use super::StructuringError;

/// One structured-extraction request.
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub function: &'a FunctionSchema,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Chat-completion service abstraction. Returns the raw function-call
/// arguments string; parsing and validation happen in the extractor.
pub trait ChatCompletionBackend {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, StructuringError>;
}

/// Blocking OpenAI-compatible client with a per-request timeout.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    arguments: String,
}

impl ChatCompletionBackend for OpenAiClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, StructuringError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": request.model,
            "messages": [
                ChatMessage { role: "system", content: request.system_prompt },
                ChatMessage { role: "user", content: request.user_prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "functions": [{
                "name": request.function.name,
                "description": request.function.description,
                "parameters": request.function.parameters,
            }],
            "function_call": { "name": request.function.name },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    StructuringError::Connection(self.base_url.clone())
                } else {
                    StructuringError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.function_call)
            .map(|call| call.arguments)
            .ok_or(StructuringError::MissingFunctionCall)
    }
}

/// Mock backend for tests: counts calls and replays a scripted sequence of
/// results, falling back to a default response once the script runs dry.
pub struct MockChatBackend {
    script: Mutex<VecDeque<Result<String, StructuringError>>>,
    default_response: String,
    calls: AtomicUsize,
}

impl MockChatBackend {
    pub fn new(default_response: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: default_response.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a scripted result to be returned before the default kicks in.
    pub fn enqueue(self, result: Result<String, StructuringError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatCompletionBackend for MockChatBackend {
    fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.default_response.clone()),
        }
    }
}

/// Shared handle so tests can keep counting calls after handing the
/// backend to an extractor.
impl ChatCompletionBackend for std::sync::Arc<MockChatBackend> {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, StructuringError> {
        self.as_ref().complete(request)
    }
}
