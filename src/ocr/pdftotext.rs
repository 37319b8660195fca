//! An "OCR" engine that calls `pdftotext`.

use tokio::process::Command;

use crate::{async_utils::check_for_command_failure, prelude::*};

use super::{OcrEngine, OcrInput};

/// "OCR" engine wrapping the `pdftotext` CLI tool from `poppler-utils`.
///
/// This will miss any "non-searchable" text in a PDF. Scanned PDFs with no
/// text layer come back empty, and are reported as having no text.
#[derive(Default)]
#[non_exhaustive]
pub struct PdfToTextOcrEngine {}

impl PdfToTextOcrEngine {
    /// Create a new `pdftotext` engine.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl OcrEngine for PdfToTextOcrEngine {
    #[instrument(level = "debug", skip_all, fields(path = %input.path.display()))]
    async fn extract_text(&self, input: OcrInput<'_>) -> Result<String> {
        if input.media_type != "application/pdf" {
            return Err(anyhow!(
                "pdftotext only works with PDFs, not {}",
                input.media_type
            ));
        }

        // An output path of `-` sends the text to standard output.
        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg(input.path)
            .arg("-")
            .output()
            .await
            .context("cannot run pdftotext")?;
        check_for_command_failure("pdftotext", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
