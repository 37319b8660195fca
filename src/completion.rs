//! Client for OpenAI-compatible chat completion APIs (Groq, OpenAI, LiteLLM,
//! Ollama and friends).
//!
//! We make exactly one attempt per request. There is no retry, because a
//! retried request would still be billed, and the user can resubmit by hand.

use std::time::Duration;

use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use clap::Args;
use reqwest::StatusCode;
use tokio::time;

use crate::prelude::*;

/// Default server URL. Groq hosts an OpenAI-compatible API.
pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Message used when the remote service gives us nothing better.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process image.";

/// Our LLM-related options.
#[derive(Args, Clone, Debug)]
pub struct LlmOpts {
    /// Base URL of an OpenAI-compatible API. Requests go to
    /// `<api-base>/chat/completions`.
    #[clap(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// API key, sent as a bearer token.
    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// The model used to answer questions.
    #[clap(long, env = "OCR_ANSWER_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// An upper limit on the number of tokens to generate.
    #[clap(long, default_value = "1024")]
    pub max_tokens: u32,

    /// A timeout, in seconds, for the LLM to return a complete response.
    #[clap(long, default_value = "120")]
    pub timeout: u64,
}

/// A single chat completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// The complete text sent as the only user message.
    pub prompt: String,

    /// Model identifier.
    pub model: String,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build the wire-format request body.
    #[allow(deprecated)]
    fn to_openai_request(&self) -> Result<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(self.prompt.clone())
            .build()
            .context("Error building user message")?;
        // Groq and many gateways still expect `max_tokens` rather than
        // `max_completion_tokens`.
        CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![message.into()])
            .max_tokens(self.max_tokens)
            .build()
            .context("Error building request")
    }
}

/// A failed call to the remote completion service.
///
/// The message is already chosen for display: the error detail reported by
/// the remote service, else the transport-level message, else a generic
/// message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    /// Pick the best available message.
    pub fn from_messages(remote_detail: Option<String>, transport: Option<String>) -> Self {
        let message = [remote_detail, transport]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_owned());
        Self { message }
    }

    fn transport(message: impl Into<String>) -> Self {
        Self::from_messages(None, Some(message.into()))
    }
}

/// Interface to a chat completion service.
#[async_trait]
pub trait CompletionService: Send + Sync + 'static {
    /// Run a "chat completion" request and return the content of the first
    /// choice, if there was any.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<Option<String>, UpstreamError>;
}

/// Response body, parsed leniently. We only need one field.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error body in the usual OpenAI format.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Client for `/chat/completions` on an OpenAI-compatible server.
#[derive(Debug)]
pub struct OpenAiCompletionClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiCompletionClient {
    /// Create a new client from our options. Fails if no API key is
    /// configured.
    pub fn new(llm_opts: &LlmOpts) -> Result<Self> {
        let api_key = llm_opts
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set (or pass --api-key)"))?;
        let mut url = llm_opts.api_base.trim_end_matches('/').to_owned();
        url.push_str("/chat/completions");
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            timeout: Duration::from_secs(llm_opts.timeout),
        })
    }

    /// Send our request and read the complete response.
    async fn send(
        &self,
        body: &CreateChatCompletionRequest,
    ) -> Result<(StatusCode, String), UpstreamError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| UpstreamError::transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| UpstreamError::transport(err.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<Option<String>, UpstreamError> {
        let body = request
            .to_openai_request()
            .map_err(|err| UpstreamError::transport(format!("{err:#}")))?;
        trace!(?body, "Request");

        let (status, text) = time::timeout(self.timeout, self.send(&body))
            .await
            .map_err(|_| UpstreamError::transport("LLM request timed out"))??;

        if !status.is_success() {
            let remote_detail = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message);
            warn!(%status, body = %text, "Completion service returned an error");
            return Err(UpstreamError::from_messages(
                remote_detail,
                Some(format!("Request failed with status code {}", status.as_u16())),
            ));
        }

        let response = serde_json::from_str::<ChatResponse>(&text).map_err(|err| {
            UpstreamError::transport(format!("Error parsing completion response: {err}"))
        })?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;

    fn llm_opts(server: &MockServer) -> LlmOpts {
        LlmOpts {
            api_base: format!("{}/openai/v1", server.uri()),
            api_key: Some("sk-test".to_owned()),
            model: "test-model".to_owned(),
            max_tokens: 1024,
            timeout: 5,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "What is the total?".to_owned(),
            model: "test-model".to_owned(),
            max_tokens: 1024,
        }
    }

    #[test]
    fn request_body_has_expected_shape() {
        let body = serde_json::to_value(request().to_openai_request().unwrap()).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 1024);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "What is the total?");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let opts = LlmOpts {
            api_base: DEFAULT_API_BASE.to_owned(),
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: 1024,
            timeout: 120,
        };
        let err = OpenAiCompletionClient::new(&opts).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn message_preference_order() {
        let err = UpstreamError::from_messages(
            Some("invalid api key".to_owned()),
            Some("Request failed with status code 401".to_owned()),
        );
        assert_eq!(err.message, "invalid api key");

        let err = UpstreamError::from_messages(None, Some("connection refused".to_owned()));
        assert_eq!(err.message, "connection refused");

        let err = UpstreamError::from_messages(Some("  ".to_owned()), None);
        assert_eq!(err.message, GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "test-model", "max_tokens": 1024 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "$42.00" } },
                    { "message": { "role": "assistant", "content": "ignored" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompletionClient::new(&llm_opts(&server)).unwrap();
        let content = client.complete(&request()).await.unwrap();
        assert_eq!(content.as_deref(), Some("$42.00"));
    }

    #[tokio::test]
    async fn missing_content_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = OpenAiCompletionClient::new(&llm_opts(&server)).unwrap();
        assert_eq!(client.complete(&request()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remote_error_detail_is_preferred() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "invalid api key", "type": "invalid_request_error" }
            })))
            // A single attempt, even for errors.
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiCompletionClient::new(&llm_opts(&server)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.message, "invalid api key");
    }

    #[tokio::test]
    async fn status_code_is_used_without_error_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = OpenAiCompletionClient::new(&llm_opts(&server)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.message, "Request failed with status code 503");
    }

    #[tokio::test]
    async fn malformed_success_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = OpenAiCompletionClient::new(&llm_opts(&server)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.message.contains("Error parsing completion response"));
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Value::Null)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut opts = llm_opts(&server);
        opts.timeout = 1;
        let client = OpenAiCompletionClient::new(&opts).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.message, "LLM request timed out");
    }
}
