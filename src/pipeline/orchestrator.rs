//! Pipeline orchestrator: drives each document through
//! Discovered → TextExtracted → FieldsExtracted → Finalized, isolating
//! failures per document and committing finalized work to the ledger.
//!
//! One logical worker processes documents sequentially in discovery order
//! — the AI call dominates latency and the service is rate-limited, so
//! there is nothing to win by parallelizing CPU work. Cancellation stops
//! new documents from entering the pipeline; the in-flight document always
//! reaches a terminal state before the batch returns.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;
use walkdir::WalkDir;

use super::extraction::DocumentExtractor;
use super::fingerprint::fingerprint_file;
use super::format::detect_kind;
use super::ledger::{Ledger, LedgerEntry};
use super::metadata::{find_first_date_in_text, NameSynthesizer};
use super::structuring::StructuredExtractor;
use super::PipelineError;
use crate::models::{
    AggregateSummary, BatchResult, DocumentRecord, DocumentStage, FailureStage,
};

/// Progress notifications for a batch run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    DocumentStarted { index: usize, total: usize, filename: String },
    DocumentSkipped { filename: String },
    DocumentFinished { filename: String, finalized: bool },
    Completed { finalized: usize, failed: usize, skipped: usize },
}

/// Read-only knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub skip_enabled: bool,
    pub review_interval: chrono::Duration,
    pub filename_template: String,
    pub output_language: String,
}

impl BatchOptions {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            skip_enabled: config.skip_processed_files,
            review_interval: config.review_interval(),
            filename_template: config.filename_template.clone(),
            output_language: config.output_language.clone(),
        }
    }
}

/// Enumerate candidate files under the scans directory, depth-first in
/// lexicographic order so discovery order is stable across runs. Hidden
/// files and directories are skipped.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::Discovery {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with('.')
        });

    for entry in walker {
        let entry = entry.map_err(|e| PipelineError::Discovery {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Runs one batch end to end.
pub struct BatchRunner {
    extractor: DocumentExtractor,
    ai: StructuredExtractor,
    options: BatchOptions,
}

impl BatchRunner {
    pub fn new(extractor: DocumentExtractor, ai: StructuredExtractor, options: BatchOptions) -> Self {
        Self {
            extractor,
            ai,
            options,
        }
    }

    /// Process every candidate file under `scans_dir`.
    ///
    /// Document-scoped failures are recorded and never abort the batch;
    /// only ledger-write failures and an unusable input directory do.
    pub fn run(
        &self,
        scans_dir: &Path,
        ledger: &mut Ledger,
        cancel: &AtomicBool,
        progress: Option<&dyn Fn(BatchEvent)>,
    ) -> Result<BatchResult, PipelineError> {
        let start = Instant::now();
        let files = discover_files(scans_dir)?;

        let mut result = BatchResult::new(Uuid::new_v4().to_string());
        result.counts.discovered = files.len();
        let mut names = NameSynthesizer::new(&self.options.filename_template);

        tracing::info!(run_id = %result.run_id, files = files.len(), "Batch starting");
        emit(progress, BatchEvent::Started { total: files.len() });

        for (index, path) in files.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                tracing::info!(
                    remaining = files.len() - index,
                    "Cancellation requested, not starting further documents"
                );
                break;
            }

            let filename = display_name(path);
            emit(
                progress,
                BatchEvent::DocumentStarted {
                    index: index + 1,
                    total: files.len(),
                    filename: filename.clone(),
                },
            );

            let fingerprint = match fingerprint_file(path) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Fingerprinting failed");
                    let mut record = DocumentRecord::discovered(String::new(), path);
                    record.fail(FailureStage::Fingerprint, e.to_string());
                    result.counts.record_failure(FailureStage::Fingerprint);
                    result.records.push(record);
                    continue;
                }
            };

            let now = Utc::now();
            if !ledger.should_process(
                &fingerprint,
                now,
                self.options.review_interval,
                self.options.skip_enabled,
            ) {
                tracing::info!(
                    fingerprint = %fingerprint,
                    path = %path.display(),
                    "Skipping recently finalized document"
                );
                result.counts.skipped += 1;
                emit(progress, BatchEvent::DocumentSkipped { filename });
                continue;
            }

            let mut record = DocumentRecord::discovered(fingerprint, path);
            self.process_document(&mut record, &mut names);

            if record.is_finalized() {
                // Durable before we report success: a crash after this
                // commit leaves the ledger consistent with "processed".
                let entry = LedgerEntry {
                    assigned_filename: record
                        .assigned_filename
                        .clone()
                        .unwrap_or_default(),
                    original_filename: record.original_filename.clone(),
                    last_processed_at: record.last_processed_at.unwrap_or(now),
                    status: DocumentStage::Finalized,
                };
                ledger.commit(&record.fingerprint, entry)?;
                result.counts.finalized += 1;
            } else if let DocumentStage::Failed { stage, reason } = &record.stage {
                tracing::error!(
                    fingerprint = %record.fingerprint,
                    stage = stage.as_str(),
                    reason = %reason,
                    "Document failed; ledger untouched, will retry next run"
                );
                result.counts.record_failure(*stage);
            }

            emit(
                progress,
                BatchEvent::DocumentFinished {
                    filename,
                    finalized: record.is_finalized(),
                },
            );
            result.records.push(record);
        }

        result.aggregate = Some(self.aggregate(&result));
        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            run_id = %result.run_id,
            finalized = result.counts.finalized,
            failed = result.counts.failed_total(),
            skipped = result.counts.skipped,
            duration_ms = result.duration_ms,
            "Batch complete"
        );
        emit(
            progress,
            BatchEvent::Completed {
                finalized: result.counts.finalized,
                failed: result.counts.failed_total(),
                skipped: result.counts.skipped,
            },
        );
        Ok(result)
    }

    /// Advance one document as far as it will go. Every failure is
    /// absorbed into the record's terminal state.
    fn process_document(&self, record: &mut DocumentRecord, names: &mut NameSynthesizer) {
        let kind = match detect_kind(&record.source_path) {
            Ok(kind) => kind,
            Err(e) => {
                record.fail(FailureStage::TextExtraction, e.to_string());
                return;
            }
        };

        let extraction = match self.extractor.extract(&record.source_path, kind) {
            Ok(extraction) => extraction,
            Err(e) => {
                record.fail(FailureStage::TextExtraction, e.to_string());
                return;
            }
        };
        tracing::debug!(
            fingerprint = %record.fingerprint,
            method = ?extraction.method,
            chars = extraction.text.len(),
            "Text extracted"
        );
        record.raw_text = Some(extraction.text);
        record.stage = DocumentStage::TextExtracted;

        let raw_text = record.raw_text.as_deref().unwrap_or_default();
        let mut fields = match self.ai.extract_document_fields(raw_text) {
            Ok(fields) => fields,
            Err(e) => {
                record.fail(FailureStage::AiExtraction, e.to_string());
                return;
            }
        };

        // A date found in the raw text outranks the AI-reported one.
        if let Some(date) = find_first_date_in_text(raw_text) {
            fields.treatment_date = Some(date);
        }
        record.stage = DocumentStage::FieldsExtracted;

        let extension = record
            .source_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let assigned = format!("{}{extension}", names.assign(&fields));

        record.extracted_fields = Some(fields);
        record.assigned_filename = Some(assigned);
        record.last_processed_at = Some(Utc::now());
        record.stage = DocumentStage::Finalized;
    }

    /// Fold all finalized records into one history text and request the
    /// aggregate summary. Never fails the batch: with nothing finalized,
    /// or with the AI call exhausted, the summary is the explicit
    /// not-available sentinel.
    fn aggregate(&self, result: &BatchResult) -> AggregateSummary {
        let mut finalized: Vec<&DocumentRecord> = result.finalized_records().collect();
        if finalized.is_empty() {
            tracing::warn!("No finalized documents, aggregate summary not available");
            return AggregateSummary::not_available(&self.options.output_language);
        }
        finalized.sort_by_key(|record| {
            record
                .extracted_fields
                .as_ref()
                .and_then(|f| f.treatment_date)
        });

        let history = finalized
            .iter()
            .filter_map(|record| record.extracted_fields.as_ref())
            .map(visit_summary_text)
            .collect::<Vec<_>>()
            .join("\n\n");

        match self.ai.summarize_history(&history) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Aggregate summary failed");
                AggregateSummary::not_available(&self.options.output_language)
            }
        }
    }
}

fn visit_summary_text(fields: &crate::models::ExtractedFields) -> String {
    let date = fields
        .treatment_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let medications = fields
        .medications
        .iter()
        .map(|m| format!("{} ({})", m.name, m.dosage))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Date: {date}\nVisit Type: {}\nProvider: {}\nDiagnoses: {}\nTreatments: {}\nMedications: {medications}\nSummary: {}",
        fields.visit_type,
        fields.provider.name,
        fields.diagnoses.join(", "),
        fields.treatments.join(", "),
        fields.summary,
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn emit(progress: Option<&dyn Fn(BatchEvent)>, event: BatchEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}
