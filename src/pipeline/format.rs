//! Input format detection from magic bytes.
//!
//! Extensions can be wrong; the first bytes of the file decide. A file
//! whose header matches nothing is accepted as plain text only if its
//! leading chunk is valid, mostly-printable UTF-8.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Broad input categories the text extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Image,
    PlainText,
    Unsupported,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Detect a file's kind by sniffing its magic bytes.
pub fn detect_kind(path: &Path) -> std::io::Result<FileKind> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 16];
    let bytes_read = file.read(&mut header)?;

    let kind = match &header[..bytes_read.min(8)] {
        // PDF: %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => FileKind::Pdf,
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => FileKind::Image,
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => FileKind::Image,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => FileKind::Image,
        _ => {
            if is_likely_text(path)? {
                FileKind::PlainText
            } else {
                FileKind::Unsupported
            }
        }
    };
    Ok(kind)
}

/// Check if a file is likely plain text: valid UTF-8 and at least 80%
/// printable characters in the first 4KB.
fn is_likely_text(path: &Path) -> std::io::Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0u8; 4096];
    let n = file.read(&mut buffer)?;
    buffer.truncate(n);

    if n == 0 {
        return Ok(false);
    }

    let text = match std::str::from_utf8(&buffer) {
        Ok(t) => t,
        Err(_) => return Ok(false),
    };

    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    let ratio = printable as f64 / text.chars().count().max(1) as f64;
    Ok(ratio > 0.80)
}
