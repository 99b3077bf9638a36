//! Text extraction: native text layer first, OCR fallback second.
//!
//! Policy per document:
//! 1. Formats with an embedded text layer (PDF) try native extraction.
//! 2. If the yield is empty or below the minimum-length heuristic, pages
//!    are rendered into a scoped temp directory and OCR'd with the
//!    configured language hint.
//! 3. If both fail, the error is local to the document — the orchestrator
//!    records it and moves on.

pub mod ocr;
pub mod pdfium;
pub mod types;

pub use ocr::{DisabledOcr, MockOcrEngine};
#[cfg(feature = "ocr")]
pub use ocr::TesseractOcr;
pub use pdfium::PdfiumEngine;
pub use types::*;

use std::path::Path;

use thiserror::Error;

use super::format::FileKind;

/// Native-text yields below this many characters trigger the OCR fallback.
pub const MIN_NATIVE_TEXT_CHARS: usize = 25;

/// Default rendering DPI for OCR. 300 is Tesseract's sweet spot.
pub const DEFAULT_RENDER_DPI: u32 = 300;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("PDF rendering failed: {0}")]
    PdfRendering(String),

    #[error("image processing error: {0}")]
    ImageProcessing(String),

    #[error("Tesseract initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR support was not compiled in (enable the `ocr` feature)")]
    OcrUnavailable,

    #[error("document has no pages")]
    EmptyDocument,

    #[error("text encoding error: {0}")]
    EncodingError(String),

    #[error("unsupported format for extraction")]
    UnsupportedFormat,

    #[error("no usable text from any extraction strategy")]
    NoUsableText,
}

/// Drives the native-then-OCR extraction policy over the trait seams.
pub struct DocumentExtractor {
    pdf_text: Box<dyn PdfTextSource>,
    renderer: Box<dyn PageRenderer>,
    ocr: Box<dyn OcrEngine>,
    language_hint: String,
    min_native_chars: usize,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(
        pdf_text: Box<dyn PdfTextSource>,
        renderer: Box<dyn PageRenderer>,
        ocr: Box<dyn OcrEngine>,
        language_hint: &str,
    ) -> Self {
        Self {
            pdf_text,
            renderer,
            ocr,
            language_hint: language_hint.to_string(),
            min_native_chars: MIN_NATIVE_TEXT_CHARS,
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }

    pub fn with_min_native_chars(mut self, min: usize) -> Self {
        self.min_native_chars = min;
        self
    }

    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    /// Extract raw text from a document of the given kind.
    pub fn extract(&self, path: &Path, kind: FileKind) -> Result<Extraction, ExtractionError> {
        match kind {
            FileKind::PlainText => self.extract_plain_text(path),
            FileKind::Pdf => {
                let bytes = std::fs::read(path)?;
                self.extract_pdf(&bytes)
            }
            FileKind::Image => {
                let bytes = std::fs::read(path)?;
                self.extract_image(&bytes)
            }
            FileKind::Unsupported => Err(ExtractionError::UnsupportedFormat),
        }
    }

    fn extract_plain_text(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let text =
            String::from_utf8(bytes).map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractionError::NoUsableText);
        }
        Ok(Extraction {
            text,
            method: ExtractionMethod::PlainTextRead,
            page_count: 1,
        })
    }

    fn extract_pdf(&self, pdf_bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let native = match self.pdf_text.text_pages(pdf_bytes) {
            Ok(pages) => pages,
            Err(e @ ExtractionError::PdfEncrypted) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Native text extraction failed, trying OCR");
                Vec::new()
            }
        };

        let page_count = native.len();
        let joined = native.join("\n");
        if joined.trim().len() >= self.min_native_chars {
            return Ok(Extraction {
                text: joined,
                method: ExtractionMethod::NativeText,
                page_count,
            });
        }

        tracing::info!(
            native_chars = joined.trim().len(),
            threshold = self.min_native_chars,
            "Text layer below threshold, falling back to OCR"
        );
        self.ocr_rendered_pages(pdf_bytes)
    }

    /// Render pages into a scoped temp dir and OCR each one. The temp dir
    /// is removed on drop, success or failure.
    fn ocr_rendered_pages(&self, pdf_bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let tmp = tempfile::tempdir()?;
        let pages = self
            .renderer
            .render_pages(pdf_bytes, self.render_dpi, tmp.path())?;

        let mut texts = Vec::with_capacity(pages.len());
        for (index, page_path) in pages.iter().enumerate() {
            let image_bytes = std::fs::read(page_path)?;
            let result = self.ocr.recognize(&image_bytes, &self.language_hint)?;
            tracing::debug!(
                page = index + 1,
                confidence = result.confidence,
                chars = result.text.len(),
                "OCR page complete"
            );
            if !result.text.trim().is_empty() {
                texts.push(result.text.trim().to_string());
            }
        }

        let page_count = pages.len();
        let text = texts.join("\n");
        if text.trim().is_empty() {
            return Err(ExtractionError::NoUsableText);
        }
        Ok(Extraction {
            text,
            method: ExtractionMethod::Ocr,
            page_count,
        })
    }

    fn extract_image(&self, image_bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let result = self.ocr.recognize(image_bytes, &self.language_hint)?;
        if result.text.trim().is_empty() {
            return Err(ExtractionError::NoUsableText);
        }
        Ok(Extraction {
            text: result.text,
            method: ExtractionMethod::Ocr,
            page_count: 1,
        })
    }
}
