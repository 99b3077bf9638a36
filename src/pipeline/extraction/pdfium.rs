//! PDF access via Google PDFium: native text layer and page rendering.
//!
//! `PdfiumEngine` is stateless. Each operation creates a fresh `Pdfium`
//! instance because the upstream type is `!Send`; the OS caches library
//! loads, so repeat loads are near-free.

use std::path::{Path, PathBuf};

use pdfium_render::prelude::*;
use tracing::debug;

use super::types::{PageRenderer, PdfTextSource};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images. Guards
/// against OOM on absurd page sizes or DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Stateless PDFium wrapper implementing both text-layer extraction and
/// page rendering.
pub struct PdfiumEngine;

impl PdfiumEngine {
    /// Create the engine, verifying the PDFium library is loadable
    /// (fail-fast at startup rather than on the first document).
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfRendering(format!("failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %exe_dir.display(), "Loaded PDFium from executable directory");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfRendering(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors — encrypted PDFs get their own variant.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("failed to load PDF: {e}"))
    }
}

/// Compute pixel dimensions for rendering, clamped to the dimension guard
/// while preserving aspect ratio.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfTextSource for PdfiumEngine {
    fn text_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        if document.pages().len() == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let mut pages = Vec::with_capacity(document.pages().len() as usize);
        for page in document.pages().iter() {
            let text = page.text().map(|t| t.all()).unwrap_or_default();
            pages.push(text);
        }
        Ok(pages)
    }
}

impl PageRenderer for PdfiumEngine {
    fn render_pages(
        &self,
        pdf_bytes: &[u8],
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let mut paths = Vec::with_capacity(document.pages().len() as usize);
        for (index, page) in document.pages().iter().enumerate() {
            let (width, height) =
                compute_render_dimensions(page.width().value, page.height().value, dpi);
            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);

            let bitmap = page.render_with_config(&config).map_err(|e| {
                ExtractionError::PdfRendering(format!("page {}: {e}", index + 1))
            })?;

            let path = out_dir.join(format!("page_{:04}.png", index + 1));
            bitmap
                .as_image()
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| {
                    ExtractionError::ImageProcessing(format!(
                        "failed to encode page {}: {e}",
                        index + 1
                    ))
                })?;

            debug!(page = index + 1, width, height, path = %path.display(), "Rendered PDF page");
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_dimensions_scale_with_dpi() {
        // US Letter at 200 DPI: 8.5in x 11in → 1700 x 2200 px
        let (w, h) = compute_render_dimensions(612.0, 792.0, 200);
        assert_eq!((w, h), (1700, 2200));
    }

    #[test]
    fn render_dimensions_clamped_to_guard() {
        let (w, h) = compute_render_dimensions(612.0, 792.0, 10_000);
        assert!(w <= MAX_DIMENSION_PX && h <= MAX_DIMENSION_PX);
        assert!(h >= MAX_DIMENSION_PX - 1, "long edge should hit the cap, got {h}");
        // Aspect ratio preserved within rounding
        let ratio = w as f32 / h as f32;
        assert!((ratio - 612.0 / 792.0).abs() < 0.01);
    }

    #[test]
    fn render_dimensions_never_zero() {
        let (w, h) = compute_render_dimensions(0.1, 0.1, 1);
        assert!(w >= 1 && h >= 1);
    }
}
