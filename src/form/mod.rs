//! The upload form: a list of selected files, a question, and the last
//! answer or error.
//!
//! [`FormState`] is an immutable value. Every user action produces a new
//! state, replacing the old one, and entries shared between the two are
//! reference-counted. When the last state holding an entry is dropped, the
//! entry's preview reference is revoked.
//!
//! Only the first (most recently selected) file is ever submitted, even when
//! several are listed.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Local};

use crate::prelude::*;

pub mod client;
pub mod grid;
pub mod preview;

use self::{
    client::SubmitError,
    preview::{PreviewRegistry, PreviewUrl},
};

/// Shown when submitting without any files.
pub const NO_FILE_MESSAGE: &str = "Please upload an image or document first.";

/// Shown when submitting with a blank question.
pub const NO_PROMPT_MESSAGE: &str = "Please enter your question or prompt.";

/// A file chosen by the user.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    /// Read a file from disk, guessing its media type from its name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        Ok(Self {
            name,
            media_type,
            data: Bytes::from(data),
        })
    }
}

/// One entry in the file list.
#[derive(Debug)]
pub struct UploadedFileView {
    pub file: Arc<SelectedFile>,
    pub preview: PreviewUrl,

    /// Human-readable time of selection.
    pub uploaded_at: String,
}

/// Everything needed to send one submission.
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub file: Arc<SelectedFile>,
    pub prompt: String,
}

/// The complete state of the form.
#[derive(Clone, Debug, Default)]
pub struct FormState {
    /// Newest first.
    files: Vec<Arc<UploadedFileView>>,
    prompt: String,
    answer: Option<String>,
    error: Option<String>,
    pending: bool,
}

impl FormState {
    pub fn files(&self) -> &[Arc<UploadedFileView>] {
        &self.files
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Is a submission in flight?
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Can the submit control be used right now?
    pub fn can_submit(&self) -> bool {
        !self.pending && !self.files.is_empty()
    }

    /// Can the question be edited right now?
    pub fn prompt_enabled(&self) -> bool {
        !self.files.is_empty()
    }

    /// Add newly selected files to the front of the list, and forget any
    /// previous answer or error.
    pub fn select_files(
        &self,
        registry: &PreviewRegistry,
        files: Vec<SelectedFile>,
        selected_at: DateTime<Local>,
    ) -> Self {
        let uploaded_at = selected_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut entries = files
            .into_iter()
            .map(|file| {
                let file = Arc::new(file);
                Arc::new(UploadedFileView {
                    preview: registry.create(file.clone()),
                    file,
                    uploaded_at: uploaded_at.clone(),
                })
            })
            .collect::<Vec<_>>();
        entries.extend(self.files.iter().cloned());
        Self {
            files: entries,
            answer: None,
            error: None,
            ..self.clone()
        }
    }

    /// Replace the question.
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..self.clone()
        }
    }

    /// Reset everything, including the file list.
    pub fn clear(&self) -> Self {
        Self::default()
    }

    /// Start a submission.
    ///
    /// Returns the new state, plus the request to send if the form is
    /// complete. Without a file or a question, the new state carries an error
    /// and there is nothing to send.
    pub fn submit(&self) -> (Self, Option<SubmitRequest>) {
        if self.pending {
            return (self.clone(), None);
        }
        let cleared = Self {
            answer: None,
            error: None,
            ..self.clone()
        };
        let Some(first) = self.files.first() else {
            return (cleared.with_error(NO_FILE_MESSAGE), None);
        };
        if self.prompt.trim().is_empty() {
            return (cleared.with_error(NO_PROMPT_MESSAGE), None);
        }
        let request = SubmitRequest {
            file: first.file.clone(),
            prompt: self.prompt.clone(),
        };
        (
            Self {
                pending: true,
                ..cleared
            },
            Some(request),
        )
    }

    /// Record the outcome of a submission.
    pub fn complete(&self, outcome: Result<String, SubmitError>) -> Self {
        let (answer, error) = match outcome {
            Ok(answer) => (Some(answer), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            answer,
            error,
            pending: false,
            ..self.clone()
        }
    }

    fn with_error(self, message: &str) -> Self {
        Self {
            error: Some(message.to_owned()),
            ..self
        }
    }
}
