//! Answering questions about uploaded files.
//!
//! Each submission runs strictly in order: validate, extract text, compose a
//! prompt, call the completion service, respond. The uploaded file lives on
//! disk only while OCR runs, in a temporary directory of its own, and that
//! directory is removed on every exit path when it goes out of scope.

use std::sync::Arc;

use tempfile::TempDir;

use crate::{
    completion::{CompletionRequest, CompletionService},
    ocr::{OcrEngine, OcrInput},
    prelude::*,
};

pub mod error;
pub mod prompt;
pub mod submission;

use self::{
    error::AnswerError,
    prompt::{ExtractedText, compose_prompt},
    submission::{Submission, UploadedFile},
};

/// Answer used when the completion service returns no content.
pub const NO_ANSWER_MESSAGE: &str = "No answer received.";

/// Everything needed to turn a [`Submission`] into an answer.
pub struct AnswerService {
    ocr: Arc<dyn OcrEngine>,
    completions: Arc<dyn CompletionService>,
    model: String,
    max_tokens: u32,

    /// Where to put temporary copies of uploads. Defaults to the system
    /// temporary directory.
    scratch_dir: Option<PathBuf>,
}

impl AnswerService {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        completions: Arc<dyn CompletionService>,
        model: String,
        max_tokens: u32,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            ocr,
            completions,
            model,
            max_tokens,
            scratch_dir,
        }
    }

    /// Answer the question in `submission`.
    #[instrument(
        level = "info",
        skip_all,
        fields(file = %submission.file.name, media_type = %submission.file.media_type)
    )]
    pub async fn answer(&self, submission: Submission) -> Result<String, AnswerError> {
        let extracted = self.extract(&submission.file).await?;
        debug!(text = %extracted.as_str(), "Extracted text");

        let prompt = compose_prompt(&extracted, &submission.prompt);
        debug!(%prompt, "Composed prompt");

        let request = CompletionRequest {
            prompt,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        };
        let answer = self
            .completions
            .complete(&request)
            .await?
            .unwrap_or_else(|| NO_ANSWER_MESSAGE.to_owned());
        debug!(%answer, "Answer");
        Ok(answer)
    }

    /// Run OCR on a temporary copy of `file`.
    async fn extract(&self, file: &UploadedFile) -> Result<ExtractedText, AnswerError> {
        let scratch = ScratchFile::write(self.scratch_dir.as_deref(), file).await?;
        let text = self
            .ocr
            .extract_text(OcrInput {
                path: scratch.path(),
                media_type: &file.media_type,
            })
            .await?;
        scratch.close();
        ExtractedText::new(text).ok_or(AnswerError::NoTextExtracted)
    }
}

/// A temporary copy of an upload, deleted when dropped.
struct ScratchFile {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchFile {
    /// Write `file` into a fresh, uniquely-named directory.
    async fn write(scratch_dir: Option<&Path>, file: &UploadedFile) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ocr-answer-");
        let dir = match scratch_dir {
            Some(scratch_dir) => builder.tempdir_in(scratch_dir),
            None => builder.tempdir(),
        }
        .context("cannot create temporary directory for upload")?;

        let extension = mime_guess::get_mime_extensions_str(&file.media_type)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("bin");
        let path = dir.path().join(format!("upload.{extension}"));
        tokio::fs::write(&path, &file.data)
            .await
            .context("cannot write temporary copy of upload")?;
        Ok(Self { dir, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, logging any problems. Dropping a `ScratchFile`
    /// also deletes it, but silently.
    fn close(self) {
        let dir = self.dir.path().to_owned();
        if let Err(err) = self.dir.close() {
            warn!(dir = %dir.display(), "cannot remove temporary upload: {err}");
        }
    }
}
