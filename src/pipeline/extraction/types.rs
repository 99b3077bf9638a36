//! Shared types and trait seams for text extraction.
//!
//! The traits exist so the pipeline can run against mocks in tests — the
//! real implementations need the PDFium dynamic library and Tesseract.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// How the raw text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    NativeText,
    Ocr,
    PlainTextRead,
}

/// Raw text produced for one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
}

/// Native PDF text-layer access.
pub trait PdfTextSource {
    /// Extract the embedded text layer, one string per page. An empty or
    /// near-empty yield means the document is likely a scan.
    fn text_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Renders PDF pages to image files for OCR.
pub trait PageRenderer {
    /// Render every page into `out_dir` as a PNG and return the paths in
    /// page order. Callers own `out_dir` and its cleanup.
    fn render_pages(
        &self,
        pdf_bytes: &[u8],
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Text recognized from one page image.
#[derive(Debug, Clone)]
pub struct OcrText {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction.
pub trait OcrEngine {
    /// Recognize text in an encoded image, with a Tesseract-style
    /// language hint such as "eng" or "eng+ita".
    fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<OcrText, ExtractionError>;
}

/// Mock PDF text source returning configured page texts.
pub struct MockPdfTextSource {
    pub pages: Vec<String>,
}

impl MockPdfTextSource {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PdfTextSource for MockPdfTextSource {
    fn text_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        Ok(self.pages.clone())
    }
}

/// Mock renderer producing tiny placeholder "page images".
pub struct MockPageRenderer {
    pub page_count: usize,
}

impl PageRenderer for MockPageRenderer {
    fn render_pages(
        &self,
        _pdf_bytes: &[u8],
        _dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let mut paths = Vec::with_capacity(self.page_count);
        for page in 0..self.page_count {
            let path = out_dir.join(format!("page_{:04}.png", page + 1));
            std::fs::write(&path, b"mock page image")?;
            paths.push(path);
        }
        Ok(paths)
    }
}
