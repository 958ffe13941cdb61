//! Pull-request chat assistant.

use super::code_review::require_inference_credentials;
use crate::adapters::{
    ChatReply, ChatRequest, GitHubClient, HttpInferenceClient, InferenceClient, SourceHosting,
};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::errors::{AdapterError, PipelineError};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Message sent when the caller does not supply one.
pub const DEFAULT_MESSAGE: &str =
    "Please review the recent changes in this pull request for code quality and potential issues.";

/// A successful chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOutcome {
    /// The backend's reply.
    pub reply: ChatReply,
    /// The comment posted to the pull request.
    pub comment: String,
}

/// Sends a message to the chat backend and posts the answer.
pub struct ChatAssistant {
    inference: Arc<dyn InferenceClient>,
    hosting: Arc<dyn SourceHosting>,
    repository: String,
    pull_request: u64,
}

impl ChatAssistant {
    /// Creates an assistant over explicit collaborators.
    #[must_use]
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        hosting: Arc<dyn SourceHosting>,
        repository: impl Into<String>,
        pull_request: u64,
    ) -> Self {
        Self {
            inference,
            hosting,
            repository: repository.into(),
            pull_request,
        }
    }

    /// Creates an assistant from configuration.
    ///
    /// # Errors
    ///
    /// Returns the first missing setting or credential.
    pub fn from_config(config: &PipelineConfig, token: Arc<CancellationToken>) -> Result<Self, PipelineError> {
        let (repository, pull_request) = config.source_hosting.pull_request_ref()?;
        require_inference_credentials(config)?;
        let hosting = GitHubClient::new(&config.source_hosting)?;
        let inference = HttpInferenceClient::new(config.inference.clone(), token)?;
        Ok(Self::new(Arc::new(inference), Arc::new(hosting), repository, pull_request))
    }

    /// Sends `message` and posts the reply.
    ///
    /// # Errors
    ///
    /// Adapter errors pass through. A reply whose status is not `success` is
    /// a validation error and nothing is posted.
    pub async fn run(
        &self,
        message: &str,
        context: Option<serde_json::Value>,
    ) -> Result<ChatOutcome, AdapterError> {
        let request = ChatRequest {
            user_message: message.to_string(),
            context,
        };
        let reply = self.inference.chat(&request).await?;
        if !reply.is_success() {
            return Err(AdapterError::Validation {
                service: "inference",
                message: format!("chat returned status '{}'", reply.status),
            });
        }

        let comment = format!("🤖 **AI Assistant:** {}", reply.bot_response);
        self.hosting
            .post_comment(&self.repository, self.pull_request, &comment)
            .await?;
        info!(
            repository = %self.repository,
            pull_request = self.pull_request,
            confidence = reply.confidence,
            "Chat reply posted"
        );
        Ok(ChatOutcome { reply, comment })
    }
}
