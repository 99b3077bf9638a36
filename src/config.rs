//! YAML configuration loading.
//!
//! All knobs the pipeline consumes are read-only inputs: scan/output
//! locations, skip/review-interval settings, OCR language hints, the
//! output language, the filename template, and AI service parameters.
//! Role prompts may reference `${output_language}`; the placeholder is
//! substituted with the language's display name at load time.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::i18n;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("AI API key is not set (OPENAI_API_KEY env var or `api_key` in config)")]
    MissingApiKey,
}

/// Top-level configuration, deserialized from `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scans_location: PathBuf,
    pub output_location: PathBuf,

    /// When true, documents already finalized within the review interval
    /// are skipped on subsequent runs.
    #[serde(default = "default_true")]
    pub skip_processed_files: bool,

    /// Review interval in days for the skip decision.
    #[serde(default = "default_review_interval_days")]
    pub skip_process_review_interval: i64,

    /// OCR language hints, joined as a Tesseract language string
    /// (e.g. ["eng", "ita"] -> "eng+ita").
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: Vec<String>,

    /// Optional tessdata directory; falls back to TESSDATA_PREFIX.
    #[serde(default)]
    pub ocr_tessdata: Option<PathBuf>,

    /// Language code for all free-text AI output (see `i18n`).
    #[serde(default = "default_output_language")]
    pub output_language: String,

    /// Template for assigned filenames. Placeholders: {patient_last},
    /// {patient_initials}, {treatment_date}, {visit_type},
    /// {provider_last}, {seq}.
    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// AI API key. The OPENAI_API_KEY environment variable takes
    /// precedence over this field.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub ai: AiConfig,
}

/// Parameters for the structured extraction service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    /// Model for the cross-document aggregate summary call.
    pub aggregate_model: String,
    pub max_tokens: u32,
    /// Low by default: repeated extraction of identical input should
    /// converge to stable output.
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Optional role prompt override; `${output_language}` is substituted.
    pub role_prompt: Option<String>,
    pub aggregate_role_prompt: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            aggregate_model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            temperature: 0.1,
            timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 500,
            role_prompt: None,
            aggregate_role_prompt: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_review_interval_days() -> i64 {
    180
}

fn default_ocr_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_output_language() -> String {
    "en".to_string()
}

fn default_filename_template() -> String {
    "{treatment_date}_{visit_type}_{provider_last}_{seq}".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&raw)?;
        config.substitute_language_placeholders();
        tracing::info!(
            path = %path.display(),
            skip_processed = config.skip_processed_files,
            review_interval_days = config.skip_process_review_interval,
            output_language = %config.output_language,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Replace `${output_language}` in role prompts with the language's
    /// display name.
    fn substitute_language_placeholders(&mut self) {
        let name = i18n::language_name(&self.output_language);
        for prompt in [&mut self.ai.role_prompt, &mut self.ai.aggregate_role_prompt]
            .into_iter()
            .flatten()
        {
            *prompt = prompt.replace("${output_language}", name);
        }
    }

    /// Resolve the AI API key: environment variable first, then config.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Tesseract-style language hint, e.g. "eng+ita".
    pub fn ocr_language_hint(&self) -> String {
        if self.ocr_languages.is_empty() {
            "eng".to_string()
        } else {
            self.ocr_languages.join("+")
        }
    }

    pub fn review_interval(&self) -> chrono::Duration {
        chrono::Duration::days(self.skip_process_review_interval.max(0))
    }

    pub fn data_files_dir(&self) -> PathBuf {
        self.output_location.join("data_files")
    }

    /// The ledger file: fingerprint -> processing record.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_files_dir().join("processed_files.json")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.output_location.join("records")
    }
}
