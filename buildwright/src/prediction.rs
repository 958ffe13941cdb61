//! Build-health prediction.

use crate::adapters::{ChatCompletionRequest, ChatMessage, InferenceClient};
use crate::config::PredictionSettings;
use crate::core::{BuildReport, PredictionResult};
use std::sync::Arc;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a build failure prediction assistant. \
Analyze the build data and predict if the build might fail.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;

/// Asks the inference backend whether a build is likely to fail.
pub struct BuildPredictor {
    client: Arc<dyn InferenceClient>,
    settings: PredictionSettings,
}

impl BuildPredictor {
    /// Creates a predictor.
    #[must_use]
    pub fn new(client: Arc<dyn InferenceClient>, settings: PredictionSettings) -> Self {
        Self { client, settings }
    }

    /// Builds the completion request for `report`.
    #[must_use]
    pub fn request_for(&self, report: &BuildReport) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Please analyze this build data and predict if it might fail: {}",
                    report.to_summary()
                )),
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Predicts build health. Adapter failures become an error result; this
    /// never returns `Err`.
    pub async fn predict(&self, report: &BuildReport) -> PredictionResult {
        let request = self.request_for(report);
        match self.client.complete(&request).await {
            Ok(content) => {
                info!(model = %self.settings.model, chars = content.len(), "Prediction received");
                PredictionResult::success(&self.settings.model, content)
            }
            Err(e) => {
                warn!(model = %self.settings.model, error = %e, "Prediction failed");
                PredictionResult::error(&self.settings.model, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Availability, BuildLog, BuildOutcome, BuildStatus, PredictionStatus};
    use crate::errors::AdapterError;
    use crate::testing::ScriptedInference;
    use pretty_assertions::assert_eq;

    fn report() -> BuildReport {
        BuildReport::builder()
            .dockerfile_exists(true)
            .ci_pipeline_exists(true)
            .build_outcome(Availability::Available(BuildOutcome {
                image_tag: "myapp:latest".to_string(),
                status: BuildStatus::Absent,
                diagnostic: Some("No such object".to_string()),
                build_log: BuildLog::default(),
            }))
            .image_tag("myapp:latest")
            .runtime_version("3.13.0")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success() {
        let client = Arc::new(ScriptedInference::new().with_completion(Ok("Likely to fail".to_string())));
        let predictor = BuildPredictor::new(client.clone(), PredictionSettings::default());

        let result = predictor.predict(&report()).await;
        assert_eq!(result, PredictionResult::success("llama3-8b-8192", "Likely to fail"));

        let requests = client.completion_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.7);
        assert_eq!(requests[0].max_tokens, 1024);
        assert_eq!(requests[0].messages[0].role, "system");
        assert!(requests[0].messages[0].content.starts_with("You are a build failure prediction assistant"));
        assert!(requests[0].messages[1].content.contains(r#""last_build_status":"absent""#));
        assert!(requests[0].messages[1].content.contains(r#""dockerfile_exists":true"#));
        assert!(requests[0].messages[1].content.contains(r#""python_version":"3.13.0""#));
    }

    #[tokio::test]
    async fn test_adapter_error_becomes_error_result() {
        let client = Arc::new(ScriptedInference::new().with_completion(Err(AdapterError::Status {
            service: "inference",
            code: 500,
            body: "internal".to_string(),
        })));
        let predictor = BuildPredictor::new(client, PredictionSettings::default());

        let result = predictor.predict(&report()).await;
        assert_eq!(result.status, PredictionStatus::Error);
        assert!(result.error.as_deref().unwrap().contains("500"));
        assert!(result.content.is_none());
    }

    #[tokio::test]
    async fn test_missing_credential_is_error_result() {
        let client = Arc::new(ScriptedInference::new().with_completion(Err(
            AdapterError::MissingCredential {
                service: "inference",
                field: "GROQ_API_KEY",
            },
        )));
        let predictor = BuildPredictor::new(
            client,
            PredictionSettings {
                model: "mixtral-8x7b".to_string(),
            },
        );

        let result = predictor.predict(&report()).await;
        assert!(!result.is_success());
        assert_eq!(result.model, "mixtral-8x7b");
        assert!(result.error.unwrap().contains("GROQ_API_KEY"));
    }
}
