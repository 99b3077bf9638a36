//! OCR engines.
//!
//! `TesseractOcr` wraps the system Tesseract libraries and is only
//! available behind the `ocr` cargo feature. Builds without the feature
//! get `DisabledOcr`, which fails with a clear error instead of silently
//! producing empty text.

use super::types::{OcrEngine, OcrText};
use super::ExtractionError;

/// Tesseract-backed OCR engine.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: Option<std::path::PathBuf>,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// `tessdata_dir = None` falls back to the TESSDATA_PREFIX env var.
    pub fn new(tessdata_dir: Option<&std::path::Path>) -> Self {
        Self {
            tessdata_dir: tessdata_dir.map(|p| p.to_path_buf()),
        }
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_bytes: &[u8], languages: &str) -> Result<OcrText, ExtractionError> {
        let datapath = self
            .tessdata_dir
            .as_ref()
            .map(|dir| {
                dir.to_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ExtractionError::OcrInit("invalid tessdata path".into()))
            })
            .transpose()?;

        let tess = tesseract::Tesseract::new(datapath.as_deref(), Some(languages))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;
        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrText { text, confidence })
    }
}

/// Placeholder engine for builds without the `ocr` feature.
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn recognize(&self, _image_bytes: &[u8], _languages: &str) -> Result<OcrText, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }
}

/// Mock OCR engine returning configured text.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image_bytes: &[u8], _languages: &str) -> Result<OcrText, ExtractionError> {
        Ok(OcrText {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_text() {
        let engine = MockOcrEngine::new("Esame del sangue: emoglobina 13.2", 0.91);
        let result = engine.recognize(b"fake image", "eng+ita").unwrap();
        assert_eq!(result.text, "Esame del sangue: emoglobina 13.2");
        assert!((result.confidence - 0.91).abs() < f32::EPSILON);
    }

    #[test]
    fn disabled_engine_reports_unavailable() {
        let engine = DisabledOcr;
        let result = engine.recognize(b"fake image", "eng");
        assert!(matches!(result, Err(ExtractionError::OcrUnavailable)));
    }
}
