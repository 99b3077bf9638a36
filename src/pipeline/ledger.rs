//! Change-detection ledger: persisted mapping fingerprint → processing
//! record, governing skip/reprocess decisions across runs.
//!
//! The ledger is a single JSON file, loaded wholesale at batch start and
//! rewritten on every commit via write-to-temp-then-rename — a partially
//! written ledger is never observable. Only finalized documents are ever
//! committed, so a crash before commit means safe reprocessing on the next
//! run (at-least-once, never at-most-once for successful work).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DocumentStage;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("ledger rename failed: {0}")]
    Persist(String),
}

/// Persisted per-fingerprint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub assigned_filename: String,
    pub original_filename: String,
    pub last_processed_at: DateTime<Utc>,
    pub status: DocumentStage,
}

/// In-memory view of the ledger file, with atomic persistence.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashMap<String, LedgerEntry>,
}

impl Ledger {
    /// Load the ledger from disk. A missing file starts fresh; a corrupt
    /// file is logged and also starts fresh — reprocessing is always safe,
    /// silently treating work as done is not.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, LedgerEntry>>(&raw) {
                Ok(entries) => {
                    tracing::info!(
                        path = %path.display(),
                        entries = entries.len(),
                        "Loaded processing ledger"
                    );
                    entries
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ledger file is corrupt, starting fresh"
                    );
                    HashMap::new()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No existing ledger, starting fresh");
                HashMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<&LedgerEntry> {
        self.entries.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Skip decision: false (skip) iff an entry exists, skipping is
    /// enabled, the entry is Finalized, and it was processed within the
    /// review interval. Only Finalized entries are skip-eligible — a prior
    /// failed attempt never suppresses reprocessing.
    pub fn should_process(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
        review_interval: Duration,
        skip_enabled: bool,
    ) -> bool {
        if !skip_enabled {
            return true;
        }
        match self.entries.get(fingerprint) {
            Some(entry) if entry.status == DocumentStage::Finalized => {
                now - entry.last_processed_at >= review_interval
            }
            _ => true,
        }
    }

    /// Atomic upsert: the entry is durable on disk before this returns,
    /// so the orchestrator never reports success for work the ledger has
    /// not recorded.
    pub fn commit(&mut self, fingerprint: &str, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.entries.insert(fingerprint.to_string(), entry);
        self.save()
    }

    fn save(&self) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| LedgerError::Persist(e.to_string()))?;
        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Ledger saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(when: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            assigned_filename: "2024-03-01_check_up_rossi_001.pdf".to_string(),
            original_filename: "scan0001.pdf".to_string(),
            last_processed_at: when,
            status: DocumentStage::Finalized,
        }
    }

    #[test]
    fn commit_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files.json");

        let mut ledger = Ledger::load(&path);
        assert!(ledger.is_empty());
        let entry = entry_at(Utc::now());
        ledger.commit("H1", entry.clone()).unwrap();

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.lookup("H1"), Some(&entry));
    }

    #[test]
    fn recent_finalized_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let now = Utc::now();

        let mut ledger = Ledger::load(&path);
        ledger.commit("H1", entry_at(now - Duration::days(5))).unwrap();

        assert!(!ledger.should_process("H1", now, Duration::days(180), true));
    }

    #[test]
    fn stale_entry_is_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let now = Utc::now();

        let mut ledger = Ledger::load(&path);
        ledger.commit("H1", entry_at(now - Duration::days(200))).unwrap();

        assert!(ledger.should_process("H1", now, Duration::days(180), true));
    }

    #[test]
    fn skip_disabled_always_processes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let now = Utc::now();

        let mut ledger = Ledger::load(&path);
        ledger.commit("H1", entry_at(now)).unwrap();

        assert!(ledger.should_process("H1", now, Duration::days(180), false));
    }

    #[test]
    fn unknown_fingerprint_is_processed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("ledger.json"));
        assert!(ledger.should_process("unseen", Utc::now(), Duration::days(180), true));
    }

    #[test]
    fn corrupt_ledger_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();

        let ledger = Ledger::load(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn commit_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = Ledger::load(&path);

        let first = entry_at(Utc::now() - Duration::days(10));
        let second = entry_at(Utc::now());
        ledger.commit("H1", first).unwrap();
        ledger.commit("H1", second.clone()).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(Ledger::load(&path).lookup("H1"), Some(&second));
    }

    #[test]
    fn no_temp_files_left_behind_after_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = Ledger::load(&path);
        for i in 0..3 {
            ledger.commit(&format!("H{i}"), entry_at(Utc::now())).unwrap();
        }

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("ledger.json")]);
    }
}
