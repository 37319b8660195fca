//! Sending a submission to the answer server.

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{answer::NO_ANSWER_MESSAGE, prelude::*, server::ANSWER_PATH};

use super::SubmitRequest;

/// Shown when the server fails without telling us why.
pub const GENERIC_SUBMIT_FAILURE: &str = "Failed to get response from AI API";

/// Why a submission failed. Displays as the message to show the user.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The server answered with a non-success status.
    #[error("{0}")]
    Rejected(String),

    /// We couldn't talk to the server at all.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// Client for the answer endpoint.
#[derive(Clone, Debug)]
pub struct AnswerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl AnswerClient {
    /// Create a client for the server at `server_url`, such as
    /// `http://localhost:3001`.
    pub fn new(server_url: &str) -> Self {
        let endpoint = format!("{}{}", server_url.trim_end_matches('/'), ANSWER_PATH);
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Send one file and one question, and return the answer.
    #[instrument(level = "debug", skip_all, fields(file = %request.file.name))]
    pub async fn submit(&self, request: &SubmitRequest) -> Result<String, SubmitError> {
        let part = Part::bytes(request.file.data.to_vec())
            .file_name(request.file.name.clone())
            .mime_str(&request.file.media_type)?;
        let form = Form::new()
            .part("file", part)
            .text("prompt", request.prompt.clone());

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            // Not every failure has a JSON body, so parse leniently.
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            debug!(%status, %body, "Server rejected submission");
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or(GENERIC_SUBMIT_FAILURE);
            return Err(SubmitError::Rejected(message.to_owned()));
        }
        let body = response.json::<Value>().await?;
        Ok(body
            .get("answer")
            .and_then(Value::as_str)
            .filter(|answer| !answer.is_empty())
            .unwrap_or(NO_ANSWER_MESSAGE)
            .to_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::form::SelectedFile;

    fn request() -> SubmitRequest {
        SubmitRequest {
            file: Arc::new(SelectedFile {
                name: "receipt.png".to_owned(),
                media_type: "image/png".to_owned(),
                data: Bytes::from_static(b"\x89PNG"),
            }),
            prompt: "What is the total?".to_owned(),
        }
    }

    #[tokio::test]
    async fn sends_file_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANSWER_PATH))
            .respond_with(|req: &wiremock::Request| {
                let body = String::from_utf8_lossy(&req.body).to_lowercase();
                assert!(body.contains("name=\"file\"; filename=\"receipt.png\""));
                assert!(body.contains("content-type: image/png"));
                assert!(body.contains("name=\"prompt\""));
                assert!(body.contains("what is the total?"));
                ResponseTemplate::new(200).set_body_json(json!({ "answer": "$42.00" }))
            })
            .expect(1)
            .mount(&server)
            .await;

        let client = AnswerClient::new(&format!("{}/", server.uri()));
        assert_eq!(client.submit(&request()).await.unwrap(), "$42.00");
    }

    #[tokio::test]
    async fn missing_answer_gets_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = AnswerClient::new(&server.uri());
        assert_eq!(client.submit(&request()).await.unwrap(), NO_ANSWER_MESSAGE);
    }

    #[tokio::test]
    async fn non_json_success_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"),
            )
            .mount(&server)
            .await;

        let client = AnswerClient::new(&server.uri());
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Transport(_)));
        assert_ne!(err.to_string(), NO_ANSWER_MESSAGE);
    }

    #[tokio::test]
    async fn server_error_message_is_shown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "No text could be extracted from the image."
            })))
            .mount(&server)
            .await;

        let client = AnswerClient::new(&server.uri());
        let err = client.submit(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "No text could be extracted from the image.");
    }

    #[tokio::test]
    async fn failure_without_message_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = AnswerClient::new(&server.uri());
        let err = client.submit(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), GENERIC_SUBMIT_FAILURE);
    }

    #[tokio::test]
    async fn transport_errors_keep_their_message() {
        let client = AnswerClient::new("http://127.0.0.1:9");
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Transport(_)));
        assert!(!err.to_string().is_empty());
    }
}
