pub mod extraction;
pub mod export;
pub mod fingerprint;
pub mod format;
pub mod ledger;
pub mod metadata;
pub mod orchestrator;
pub mod structuring;

pub use orchestrator::{discover_files, BatchEvent, BatchOptions, BatchRunner};

use std::path::PathBuf;

use thiserror::Error;

use self::ledger::LedgerError;

/// Batch-fatal errors. Document-scoped failures never surface here — they
/// are absorbed into `DocumentStage::Failed` by the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input directory error at {path}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    /// Ledger writes must not silently lose state; a failed commit aborts
    /// the batch.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
