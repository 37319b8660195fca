//! OCR engine interface.
//!
//! We don't do any character recognition ourselves. Instead, we shell out to
//! well-known tools, and pick one based on the media type of the upload.

use std::sync::Arc;

use crate::prelude::*;

pub mod pdftotext;
pub mod tesseract;

/// Input record describing a file to OCR.
pub struct OcrInput<'a> {
    /// Where the file has been written on disk.
    pub path: &'a Path,

    /// The media type of the file, such as `image/png`.
    pub media_type: &'a str,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Extract all the text we can find in a file. The result may be empty or
    /// consist only of whitespace; callers decide what that means.
    async fn extract_text(&self, input: OcrInput<'_>) -> Result<String>;
}

/// Routes PDFs to `pdftotext` and everything else to `tesseract`.
pub struct MediaTypeOcrEngine {
    images: Arc<dyn OcrEngine>,
    pdfs: Arc<dyn OcrEngine>,
}

impl MediaTypeOcrEngine {
    /// Create our default engine, using `language` as the OCR language hint.
    pub fn new(language: &str) -> Self {
        Self {
            images: Arc::new(tesseract::TesseractOcrEngine::new(language)),
            pdfs: Arc::new(pdftotext::PdfToTextOcrEngine::new()),
        }
    }
}

#[async_trait]
impl OcrEngine for MediaTypeOcrEngine {
    async fn extract_text(&self, input: OcrInput<'_>) -> Result<String> {
        if input.media_type == "application/pdf" {
            self.pdfs.extract_text(input).await
        } else {
            self.images.extract_text(input).await
        }
    }
}
