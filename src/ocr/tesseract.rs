//! Tesseract OCR engine.

use tokio::process::Command;

use crate::{async_utils::check_for_command_failure, prelude::*};

use super::{OcrEngine, OcrInput};

/// OCR engine wrapping the `tesseract` CLI tool.
pub struct TesseractOcrEngine {
    /// Tesseract language code, such as `eng` or `eng+deu`.
    language: String,
}

impl TesseractOcrEngine {
    /// Create a new `tesseract` engine.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_owned(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    #[instrument(level = "debug", skip_all, fields(path = %input.path.display()))]
    async fn extract_text(&self, input: OcrInput<'_>) -> Result<String> {
        // `stdout` as the output base makes tesseract print the text instead of
        // writing `<base>.txt`.
        let output = Command::new("tesseract")
            .arg(input.path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
