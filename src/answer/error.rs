//! Errors returned by the answer endpoint.

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;
use tracing::{debug, error, info, warn};

use crate::completion::{GENERIC_FAILURE_MESSAGE, UpstreamError};

/// Message for a submission without a file or a prompt.
pub const MISSING_INPUT_MESSAGE: &str = "File and prompt are required.";

/// Message for a file where OCR found nothing.
pub const NO_TEXT_MESSAGE: &str = "No text could be extracted from the image.";

#[derive(ThisError, Debug)]
pub enum AnswerError {
    /// Missing or unusable request data. No OCR or LLM call has been made.
    #[error("{message}")]
    Input { message: String },

    /// The upload exceeded our size limit.
    #[error("File is too large.")]
    PayloadTooLarge,

    /// OCR ran, but found only whitespace.
    #[error("No text could be extracted from the image.")]
    NoTextExtracted,

    /// The remote completion service failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Anything else, including OCR tool failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnswerError {
    /// Create an [`AnswerError::Input`].
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Classify a failure to read the multipart body.
    pub fn from_multipart(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::input(format!("Failed to parse multipart data: {}", err.body_text()))
        }
    }

    /// Classify a request that isn't `multipart/form-data` at all. Without a
    /// multipart body there is no file, so this is reported as missing input.
    pub fn from_multipart_rejection(rejection: MultipartRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            debug!("Not a multipart request: {}", rejection.body_text());
            Self::input(MISSING_INPUT_MESSAGE)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AnswerError::Input { .. } | AnswerError::NoTextExtracted => {
                StatusCode::BAD_REQUEST
            }
            AnswerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AnswerError::Upstream(_) | AnswerError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a user-safe error message, without leaking internal details.
    pub fn user_message(&self) -> String {
        match self {
            AnswerError::Other(_) => GENERIC_FAILURE_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AnswerError {
    fn into_response(self) -> Response {
        match &self {
            AnswerError::Other(err) => error!("Internal error: {:#}", err),
            AnswerError::Upstream(err) => warn!("Completion service error: {}", err),
            _ => info!("Rejected submission: {}", self),
        }
        let body = Json(json!({ "error": self.user_message() }));
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AnswerError::input(MISSING_INPUT_MESSAGE).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AnswerError::NoTextExtracted.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AnswerError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let upstream = UpstreamError::from_messages(Some("invalid api key".to_owned()), None);
        assert_eq!(
            AnswerError::from(upstream).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_shown_to_users() {
        let err = AnswerError::from(anyhow!("tesseract failed with exit code 1"));
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn upstream_message_is_shown_verbatim() {
        let upstream = UpstreamError::from_messages(Some("invalid api key".to_owned()), None);
        assert_eq!(AnswerError::from(upstream).user_message(), "invalid api key");
    }

    #[test]
    fn no_text_message_matches_constant() {
        assert_eq!(AnswerError::NoTextExtracted.user_message(), NO_TEXT_MESSAGE);
    }
}
