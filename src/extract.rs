//! Document extraction: uploaded bytes → tagged plain text.
//!
//! ## The seam
//!
//! Consumers (the context assembler, via the cache) depend only on
//! [`DocumentExtractor`]; the production implementation is
//! [`PdfExtractor`]. Tests inject stub extractors through
//! [`crate::LecternConfig::extractor`] and never touch pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state that must not run on
//! Tokio worker threads, and OCR over embedded images is CPU-bound on top.
//! The whole per-document walk runs inside `tokio::task::spawn_blocking`.
//!
//! ## Output shape
//!
//! Every emitted segment is tagged with its origin so generated study
//! material can cite sources:
//!
//! ```text
//! [lecture4.pdf Page 2]
//! <page text>
//! [lecture4.pdf Page 2] <text recognised inside an embedded image>
//! ```
//!
//! Segments appear in document order. The recogniser for embedded raster
//! images is itself an injected seam ([`ImageTextRecognizer`]) — the crate
//! ships no OCR engine.

use crate::error::LecternError;
use crate::normalize;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Converts one uploaded document's raw bytes into a single tagged text
/// string. Deterministic for identical bytes; expected to be expensive.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract all text from `bytes`. `label` is the user-visible document
    /// name used in segment tags; it plays no role in caching.
    async fn extract(&self, bytes: &[u8], label: &str) -> Result<String, LecternError>;
}

/// Recognises text inside a raster image (the OCR engine seam).
///
/// Called synchronously from inside the extraction worker thread, once per
/// embedded image. A failure skips that image only — it never fails the
/// document.
pub trait ImageTextRecognizer: Send + Sync {
    fn recognize(
        &self,
        image: &DynamicImage,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// PDF implementation of [`DocumentExtractor`] backed by pdfium.
///
/// Walks each page in order: the page's text layer first, then every
/// embedded raster image through the optional [`ImageTextRecognizer`].
/// The result is normalised ([`crate::normalize::clean_text`]) before it is
/// returned — and therefore before it enters the cache.
#[derive(Default)]
pub struct PdfExtractor {
    ocr: Option<Arc<dyn ImageTextRecognizer>>,
}

impl PdfExtractor {
    /// Text-layer extraction only; embedded images contribute nothing.
    pub fn new() -> Self {
        Self { ocr: None }
    }

    /// Extraction with OCR over embedded raster images.
    pub fn with_ocr(ocr: Arc<dyn ImageTextRecognizer>) -> Self {
        Self { ocr: Some(ocr) }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, bytes: &[u8], label: &str) -> Result<String, LecternError> {
        // Reject non-PDF uploads before spinning up pdfium; a meaningful
        // error beats a library crash deep in the parser.
        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            return Err(LecternError::ExtractionFailed {
                label: label.to_string(),
                detail: "not a PDF (missing %PDF header)".to_string(),
            });
        }

        // pdfium needs a filesystem path; park the bytes in a managed temp
        // file that lives exactly as long as the blocking task.
        let mut tmp = tempfile::NamedTempFile::new().map_err(|e| LecternError::Internal(
            format!("tempfile: {e}"),
        ))?;
        tmp.write_all(bytes)
            .map_err(|e| LecternError::Internal(format!("tempfile write: {e}")))?;

        let label = label.to_string();
        let ocr = self.ocr.clone();

        tokio::task::spawn_blocking(move || {
            let result = extract_blocking(tmp.path(), &label, ocr.as_deref());
            drop(tmp);
            result
        })
        .await
        .map_err(|e| LecternError::Internal(format!("extraction task panicked: {e}")))?
    }
}

/// Blocking per-document walk. Runs on the blocking thread pool.
fn extract_blocking(
    pdf_path: &Path,
    label: &str,
    ocr: Option<&dyn ImageTextRecognizer>,
) -> Result<String, LecternError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| LecternError::ExtractionFailed {
                label: label.to_string(),
                detail: format!("{e:?}"),
            })?;

    let mut segments: Vec<String> = Vec::new();

    for (index, page) in document.pages().iter().enumerate() {
        let page_num = index + 1;

        match page.text() {
            Ok(text) => {
                let text = text.all();
                if !text.trim().is_empty() {
                    segments.push(format!("[{label} Page {page_num}]\n{text}"));
                }
            }
            Err(e) => debug!("no text layer on page {page_num} of '{label}': {e:?}"),
        }

        let Some(ocr) = ocr else { continue };

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let image = match image_object.get_raw_image() {
                Ok(image) => image,
                Err(e) => {
                    debug!("undecodable image on page {page_num} of '{label}': {e:?}");
                    continue;
                }
            };
            match ocr.recognize(&image) {
                Ok(text) if !text.trim().is_empty() => {
                    segments.push(format!("[{label} Page {page_num}] {}", text.trim()));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("ocr failed for an image on page {page_num} of '{label}': {e}");
                }
            }
        }
    }

    if segments.is_empty() {
        // Caching an empty string would make this document permanently
        // blank; surface it so the caller can retry (e.g. with OCR wired).
        return Err(LecternError::ExtractionFailed {
            label: label.to_string(),
            detail: "document produced no text (empty, or image-only without OCR)".to_string(),
        });
    }

    Ok(normalize::clean_text(&segments.join("\n")))
}
