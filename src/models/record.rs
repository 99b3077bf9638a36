//! Per-document processing records and the per-run batch result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::ExtractedFields;
use crate::i18n;

/// Stage at which a document's pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fingerprint,
    TextExtraction,
    AiExtraction,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fingerprint => "fingerprint",
            Self::TextExtraction => "text_extraction",
            Self::AiExtraction => "ai_extraction",
        }
    }
}

/// State machine per document:
/// Discovered → TextExtracted → FieldsExtracted → Finalized, with
/// Failed(stage, reason) absorbing from any stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentStage {
    Discovered,
    TextExtracted,
    FieldsExtracted,
    Finalized,
    Failed { stage: FailureStage, reason: String },
}

/// One record per input file, mutated only by the orchestrator as the
/// document advances through stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Content hash — the document's stable identity.
    pub fingerprint: String,
    /// Original location; never mutated.
    pub source_path: PathBuf,
    pub original_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_fields: Option<ExtractedFields>,
    /// Canonical name, unique within the batch; assigned once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_filename: Option<String>,
    pub stage: DocumentStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    pub fn discovered(fingerprint: String, source_path: &Path) -> Self {
        let original_filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            fingerprint,
            source_path: source_path.to_path_buf(),
            original_filename,
            raw_text: None,
            extracted_fields: None,
            assigned_filename: None,
            stage: DocumentStage::Discovered,
            last_processed_at: None,
        }
    }

    pub fn fail(&mut self, stage: FailureStage, reason: impl Into<String>) {
        self.stage = DocumentStage::Failed {
            stage,
            reason: reason.into(),
        };
    }

    pub fn is_finalized(&self) -> bool {
        self.stage == DocumentStage::Finalized
    }
}

/// Cross-document summary derived from all finalized records in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub patient_profile: String,
    pub medical_history: String,
    /// False when the summary is the "not available" sentinel.
    pub available: bool,
}

impl AggregateSummary {
    pub fn not_available(language: &str) -> Self {
        let sentinel = i18n::not_available(language).to_string();
        Self {
            patient_profile: sentinel.clone(),
            medical_history: sentinel,
            available: false,
        }
    }
}

/// Counts reported for a completed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub discovered: usize,
    pub skipped: usize,
    pub finalized: usize,
    pub failed: BTreeMap<FailureStage, usize>,
}

impl BatchCounts {
    pub fn record_failure(&mut self, stage: FailureStage) {
        *self.failed.entry(stage).or_insert(0) += 1;
    }

    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }
}

/// Result of one batch run: records in discovery order (used downstream
/// for chronological display), plus the optional aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: String,
    pub records: Vec<DocumentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateSummary>,
    pub counts: BatchCounts,
    pub duration_ms: u64,
}

impl BatchResult {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            records: Vec::new(),
            aggregate: None,
            counts: BatchCounts::default(),
            duration_ms: 0,
        }
    }

    pub fn finalized_records(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.iter().filter(|r| r.is_finalized())
    }
}
