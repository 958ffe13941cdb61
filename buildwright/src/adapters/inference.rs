//! Inference backend adapter.
//!
//! Three calls are supported: OpenAI-style chat completions (used by the
//! prediction stage), `<endpoint>/code-review` and chat on the endpoint root
//! (used by the review assistants). Responses are validated into closed types at this
//! boundary; nothing past it sees raw JSON.

use super::truncate_body;
use crate::cancellation::{run_with_deadline, CancellationToken, Interrupted};
use crate::config::InferenceSettings;
use crate::errors::AdapterError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

const SERVICE: &str = "inference";

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// An OpenAI-style chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    /// Model name.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion length limit.
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// One file submitted for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReviewRequest {
    /// Path of the file in the repository.
    pub file_name: String,
    /// File content, or a URL where it can be fetched.
    pub file_content: String,
    /// Unified diff of the change.
    pub diff: String,
}

/// A problem reported by the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    /// What is wrong.
    pub description: String,
    /// Line the issue refers to, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    /// Severity label, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

/// Review feedback for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReviewFeedback {
    /// Issues found.
    pub issues: Vec<ReviewIssue>,
    /// Suggested improvements.
    pub suggestions: Vec<String>,
    /// Overall quality verdict.
    pub overall_quality: String,
}

#[derive(Debug, Serialize)]
struct CodeReviewEnvelope<'a> {
    model_id: &'a str,
    input_data: &'a CodeReviewRequest,
}

/// A chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub user_message: String,
    /// Free-form context for the conversation.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

/// A chat reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Generated answer.
    pub bot_response: String,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f64,
    /// `success` or a backend-specific failure label.
    pub status: String,
}

impl ChatReply {
    /// Returns true if the backend reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Calls to the inference backend.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Runs a chat completion and returns the first choice's text.
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AdapterError>;

    /// Reviews one file.
    async fn review_code(
        &self,
        model: &str,
        request: &CodeReviewRequest,
    ) -> Result<CodeReviewFeedback, AdapterError>;

    /// Sends a chat message.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AdapterError>;
}

/// HTTP implementation of [`InferenceClient`].
///
/// Every call runs under the configured deadline and is abandoned as soon as
/// the shared cancellation token fires.
pub struct HttpInferenceClient {
    http_client: Client,
    settings: InferenceSettings,
    token: Arc<CancellationToken>,
}

impl HttpInferenceClient {
    /// Creates a client from settings.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Transport` if the HTTP client cannot be built.
    pub fn new(settings: InferenceSettings, token: Arc<CancellationToken>) -> Result<Self, AdapterError> {
        let http_client = Client::builder().build().map_err(|e| AdapterError::Transport {
            service: SERVICE,
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            http_client,
            settings,
            token,
        })
    }

    fn api_key(&self) -> Result<&str, AdapterError> {
        self.settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AdapterError::MissingCredential {
                service: SERVICE,
                field: "GROQ_API_KEY",
            })
    }

    fn endpoint(&self) -> Result<&str, AdapterError> {
        self.settings
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .ok_or(AdapterError::MissingCredential {
                service: SERVICE,
                field: "GROQ_API_ENDPOINT",
            })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, AdapterError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let api_key = self.api_key()?;
        let deadline = self.settings.timeout();
        let start = Instant::now();

        debug!(url = %url, "Sending inference request");

        let call = async {
            let response = self
                .http_client
                .post(url)
                .bearer_auth(api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    error!(url = %url, error = %e, "Inference request failed");
                    let message = if e.is_connect() {
                        format!("connection failed: {e}")
                    } else {
                        format!("request failed: {e}")
                    };
                    AdapterError::Transport {
                        service: SERVICE,
                        message,
                    }
                })?;

            let status = response.status();
            let text = response.text().await.map_err(|e| AdapterError::Transport {
                service: SERVICE,
                message: format!("failed to read response body: {e}"),
            })?;

            if !status.is_success() {
                error!(status = %status, "Inference backend returned error status");
                return Err(AdapterError::Status {
                    service: SERVICE,
                    code: status.as_u16(),
                    body: truncate_body(&text),
                });
            }

            serde_json::from_str::<R>(&text).map_err(|e| AdapterError::Validation {
                service: SERVICE,
                message: format!("unexpected response shape: {e}"),
            })
        };

        let result = run_with_deadline(&self.token, deadline, call)
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::DeadlineExceeded(d) => AdapterError::DeadlineExceeded {
                    service: SERVICE,
                    seconds: d.as_secs(),
                },
                Interrupted::Cancelled(reason) => AdapterError::Cancelled {
                    service: SERVICE,
                    reason,
                },
            })?;

        info!(
            url = %url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Inference request finished"
        );
        result
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AdapterError> {
        let response: ChatCompletionResponse =
            self.post_json(&self.settings.completions_url, request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdapterError::Validation {
                service: SERVICE,
                message: "no content in completion response".to_string(),
            })
    }

    async fn review_code(
        &self,
        model: &str,
        request: &CodeReviewRequest,
    ) -> Result<CodeReviewFeedback, AdapterError> {
        let url = format!("{}/code-review", self.endpoint()?);
        let envelope = CodeReviewEnvelope {
            model_id: model,
            input_data: request,
        };
        self.post_json(&url, &envelope).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AdapterError> {
        // Chat requests go to the endpoint root.
        let url = self.endpoint()?;
        self.post_json(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;

    const COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";

    fn settings(server: &ServerGuard) -> InferenceSettings {
        InferenceSettings {
            completions_url: format!("{}{COMPLETIONS_PATH}", server.url()),
            endpoint: Some(server.url()),
            api_key: Some("test-key".to_string()),
            timeout_secs: 5,
        }
    }

    fn client(settings: InferenceSettings) -> HttpInferenceClient {
        HttpInferenceClient::new(settings, Arc::new(CancellationToken::new())).unwrap()
    }

    fn completion_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "llama3-8b-8192".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    #[tokio::test]
    async fn test_complete_reads_first_choice() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama3-8b-8192",
                "max_tokens": 1024,
                "messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"looks healthy"}}]}"#)
            .create_async()
            .await;

        let text = client(settings(&server)).complete(&completion_request()).await.unwrap();
        assert_eq!(text, "looks healthy");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_status_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let err = client(settings(&server)).complete(&completion_request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Status { code: 500, .. }));
        assert!(err.to_string().contains("boom"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_validation_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", COMPLETIONS_PATH)
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client(settings(&server)).complete(&completion_request()).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_sending() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .expect(0)
            .create_async()
            .await;
        let mut settings = settings(&server);
        settings.api_key = None;

        let err = client(settings).complete(&completion_request()).await.unwrap_err();
        assert_eq!(
            err,
            AdapterError::MissingCredential {
                service: "inference",
                field: "GROQ_API_KEY"
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", COMPLETIONS_PATH)
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(3));
                w.write_all(b"{}")
            })
            .create_async()
            .await;
        let mut settings = settings(&server);
        settings.timeout_secs = 1;

        let err = client(settings).complete(&completion_request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::DeadlineExceeded { seconds: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS_PATH)
            .expect(0)
            .create_async()
            .await;
        let token = Arc::new(CancellationToken::new());
        token.cancel("ctrl-c");
        let client = HttpInferenceClient::new(settings(&server), token).unwrap();

        let err = client.complete(&completion_request()).await.unwrap_err();
        assert_eq!(
            err,
            AdapterError::Cancelled {
                service: "inference",
                reason: "ctrl-c".to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let settings = InferenceSettings {
            completions_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            endpoint: None,
            api_key: Some("k".to_string()),
            timeout_secs: 5,
        };
        let err = client(settings).complete(&completion_request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_review_code_envelope() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/code-review")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::Json(json!({
                "model_id": "llama3-8b-8192",
                "input_data": {
                    "file_name": "app.py",
                    "file_content": "https://raw/app.py",
                    "diff": "@@ -1 +1 @@"
                }
            })))
            .with_status(200)
            .with_body(
                r#"{"issues":[{"description":"unused import","line":3}],"suggestions":["add tests"],"overall_quality":"good"}"#,
            )
            .create_async()
            .await;

        let request = CodeReviewRequest {
            file_name: "app.py".to_string(),
            file_content: "https://raw/app.py".to_string(),
            diff: "@@ -1 +1 @@".to_string(),
        };
        let feedback = client(settings(&server))
            .review_code("llama3-8b-8192", &request)
            .await
            .unwrap();

        assert_eq!(feedback.issues[0].description, "unused import");
        assert_eq!(feedback.issues[0].line, Some(3));
        assert_eq!(feedback.overall_quality, "good");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_review_code_rejects_malformed_feedback() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/code-review")
            .with_status(200)
            .with_body(r#"{"issues":"none"}"#)
            .create_async()
            .await;
        let request = CodeReviewRequest {
            file_name: "app.py".to_string(),
            file_content: String::new(),
            diff: String::new(),
        };
        let err = client(settings(&server))
            .review_code("m", &request)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_chat_requires_endpoint() {
        let server = Server::new_async().await;
        let mut settings = settings(&server);
        settings.endpoint = None;
        let request = ChatRequest {
            user_message: "hello".to_string(),
            context: None,
        };

        let err = client(settings).chat(&request).await.unwrap_err();
        assert!(matches!(
            err,
            AdapterError::MissingCredential {
                field: "GROQ_API_ENDPOINT",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_chat_posts_to_endpoint_root() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::Json(json!({
                "user_message": "review please",
                "context": {"pr": 7}
            })))
            .with_status(200)
            .with_body(r#"{"bot_response":"LGTM","confidence":0.9,"status":"success"}"#)
            .create_async()
            .await;
        let mut settings = settings(&server);
        settings.endpoint = Some(format!("{}/", server.url()));
        let request = ChatRequest {
            user_message: "review please".to_string(),
            context: Some(json!({"pr": 7})),
        };

        let reply = client(settings).chat(&request).await.unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.bot_response, "LGTM");
        mock.assert_async().await;
    }
}
