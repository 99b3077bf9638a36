//! Cartella — incremental medical document extraction pipeline.
//!
//! Takes a directory of heterogeneous medical documents (digital PDFs,
//! scans, plain text), extracts raw text (native layer or OCR), runs a
//! schema-constrained AI extraction per document, assigns deterministic
//! filenames, and records finished work in a durable ledger so unchanged
//! files are skipped on the next run. Per-document failures are isolated:
//! one bad scan never aborts the batch.

pub mod config;
pub mod i18n;
pub mod models;
pub mod pipeline;
