//! Handoff files for downstream renderers.
//!
//! The core's only contract with the PDF/HTML presentation layer is the
//! finalized batch data, in discovery order, written as JSON under
//! `<output>/data_files/`. Files are written atomically with the same
//! temp-then-rename discipline as the ledger.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::models::BatchResult;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("export rename failed: {0}")]
    Persist(String),
}

/// Write `records.json` (all per-document records, discovery order) and
/// `summary.json` (the aggregate summary) into `data_dir`.
pub fn write_batch_outputs(result: &BatchResult, data_dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(data_dir)?;
    write_json_atomic(&data_dir.join("records.json"), &result.records)?;
    if let Some(aggregate) = &result.aggregate {
        write_json_atomic(&data_dir.join("summary.json"), aggregate)?;
    }
    tracing::info!(
        dir = %data_dir.display(),
        records = result.records.len(),
        "Batch outputs written"
    );
    Ok(())
}

/// Copy every finalized document into `records_dir` under its assigned
/// filename. Sources are never moved or mutated.
pub fn copy_finalized_records(result: &BatchResult, records_dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(records_dir)?;
    for record in result.finalized_records() {
        let Some(assigned) = record.assigned_filename.as_deref() else {
            continue;
        };
        let target = records_dir.join(assigned);
        std::fs::copy(&record.source_path, &target)?;
        tracing::debug!(
            source = %record.source_path.display(),
            target = %target.display(),
            "Copied finalized record"
        );
    }
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| ExportError::Persist(e.to_string()))?;
    Ok(())
}
