//! Reading and validating a submission from a multipart request.

use axum::extract::Multipart;
use bytes::Bytes;

use crate::prelude::*;

use super::error::{AnswerError, MISSING_INPUT_MESSAGE};

/// Declared media type that tells us nothing.
const OCTET_STREAM: &str = "application/octet-stream";

/// An uploaded file, held in memory until it is needed on disk.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// The original file name, as sent by the client.
    pub name: String,

    /// The media type, resolved from the declared type, the contents, or the
    /// file name.
    pub media_type: String,

    /// The file contents. Never empty.
    pub data: Bytes,
}

/// One file and one question, processed together.
#[derive(Clone, Debug)]
pub struct Submission {
    pub file: UploadedFile,

    /// The user's question, exactly as sent. Never blank.
    pub prompt: String,
}

/// A `file` part before validation.
#[derive(Debug)]
pub struct RawFilePart {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Submission {
    /// Validate the raw form fields.
    pub fn validate(
        file: Option<RawFilePart>,
        prompt: Option<String>,
    ) -> Result<Self, AnswerError> {
        let (Some(file), Some(prompt)) = (file, prompt) else {
            return Err(AnswerError::input(MISSING_INPUT_MESSAGE));
        };
        if file.data.is_empty() || prompt.trim().is_empty() {
            return Err(AnswerError::input(MISSING_INPUT_MESSAGE));
        }

        let name = file.name.unwrap_or_else(|| "upload".to_owned());
        let media_type = resolve_media_type(file.content_type.as_deref(), &name, &file.data);
        if !is_supported_media_type(&media_type) {
            return Err(AnswerError::input(format!(
                "Unsupported file type: {media_type}."
            )));
        }

        Ok(Self {
            file: UploadedFile {
                name,
                media_type,
                data: file.data,
            },
            prompt,
        })
    }

    /// Read the `file` and `prompt` fields from a multipart body. Other
    /// fields are ignored. If a field appears more than once, the last one
    /// wins.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AnswerError> {
        let mut file = None;
        let mut prompt = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(AnswerError::from_multipart)?
        {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                "file" => {
                    let name = field.file_name().map(|s| s.to_string());
                    let content_type = field.content_type().map(|s| s.to_string());
                    let data = field.bytes().await.map_err(AnswerError::from_multipart)?;
                    debug!(?name, ?content_type, size = data.len(), "Received file");
                    file = Some(RawFilePart {
                        name,
                        content_type,
                        data,
                    });
                }
                "prompt" => {
                    prompt = Some(field.text().await.map_err(AnswerError::from_multipart)?);
                }
                other => {
                    trace!(field = other, "Ignoring unknown multipart field");
                }
            }
        }
        Self::validate(file, prompt)
    }
}

/// Decide what kind of file we have. Browsers usually declare a type, but
/// command-line clients often send `application/octet-stream`.
fn resolve_media_type(declared: Option<&str>, name: &str, data: &[u8]) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if !declared.is_empty() && declared != OCTET_STREAM {
            return declared.to_ascii_lowercase();
        }
    }
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_owned();
    }
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_owned()
}

/// We can OCR images, and extract text from PDFs.
fn is_supported_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/") || media_type == "application/pdf"
}
