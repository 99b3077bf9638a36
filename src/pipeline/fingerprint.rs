//! Content fingerprinting — the stable identity of an input file.
//!
//! SHA-256 over the file bytes, base64-encoded. Any byte-level change to
//! a source file yields a new fingerprint, so the ledger never conflates
//! two different contents under one key.

use std::io::Read;
use std::path::Path;

use base64::Engine;
use sha2::{Digest, Sha256};

/// Fingerprint a file by streaming its contents through SHA-256.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Fingerprint an in-memory buffer. Equivalent to `fingerprint_file` on a
/// file with the same contents.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(bytes))
}
