//! Per-file pull-request code review.

use crate::adapters::{
    CodeReviewFeedback, CodeReviewRequest, GitHubClient, HttpInferenceClient, InferenceClient,
    SourceHosting,
};
use crate::cancellation::CancellationToken;
use crate::config::{PipelineConfig, ReviewSettings};
use crate::errors::{AdapterError, ConfigError, PipelineError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What the reviewer said about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// The backend returned feedback.
    Feedback(CodeReviewFeedback),
    /// The review request for this file failed.
    Error(String),
}

/// Review result for one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReview {
    /// Path of the file.
    pub file: String,
    /// Feedback or per-file error.
    pub verdict: ReviewVerdict,
}

impl FileReview {
    /// Formats the review as a markdown comment.
    #[must_use]
    pub fn to_comment(&self) -> String {
        match &self.verdict {
            ReviewVerdict::Error(error) => {
                format!("⚠️ **Code Review Error**: `{}`: {error}", self.file)
            }
            ReviewVerdict::Feedback(feedback) => {
                let issues = bullet_list(feedback.issues.iter().map(|i| i.description.as_str()));
                let suggestions = bullet_list(feedback.suggestions.iter().map(String::as_str));
                format!(
                    "### 📝 Code Review for `{}`\n\n**Overall Quality**: {}\n\n**Issues Found**:\n{}\n\n**Suggestions**:\n{}",
                    self.file, feedback.overall_quality, issues, suggestions
                )
            }
        }
    }
}

fn bullet_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let lines: Vec<String> = items.map(|item| format!("- {item}")).collect();
    if lines.is_empty() {
        "- none".to_string()
    } else {
        lines.join("\n")
    }
}

/// Reviews the files of one pull request and posts the results.
pub struct CodeReviewer {
    inference: Arc<dyn InferenceClient>,
    hosting: Arc<dyn SourceHosting>,
    settings: ReviewSettings,
    repository: String,
    pull_request: u64,
}

impl CodeReviewer {
    /// Creates a reviewer over explicit collaborators.
    #[must_use]
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        hosting: Arc<dyn SourceHosting>,
        settings: ReviewSettings,
        repository: impl Into<String>,
        pull_request: u64,
    ) -> Self {
        Self {
            inference,
            hosting,
            settings,
            repository: repository.into(),
            pull_request,
        }
    }

    /// Creates a reviewer from configuration, refusing to start when a
    /// credential or the pull-request reference is missing.
    ///
    /// # Errors
    ///
    /// Returns the first missing setting.
    pub fn from_config(config: &PipelineConfig, token: Arc<CancellationToken>) -> Result<Self, PipelineError> {
        let (repository, pull_request) = config.source_hosting.pull_request_ref()?;
        require_inference_credentials(config)?;
        let hosting = GitHubClient::new(&config.source_hosting)?;
        let inference = HttpInferenceClient::new(config.inference.clone(), token)?;
        Ok(Self::new(
            Arc::new(inference),
            Arc::new(hosting),
            config.review.clone(),
            repository,
            pull_request,
        ))
    }

    fn wants(&self, filename: &str) -> bool {
        self.settings
            .extensions
            .iter()
            .any(|ext| filename.ends_with(ext.as_str()))
    }

    /// Reviews every changed file with a configured extension.
    ///
    /// # Errors
    ///
    /// Fails only if the file listing fails; per-file review errors are
    /// recorded in the result.
    pub async fn review(&self) -> Result<Vec<FileReview>, AdapterError> {
        let files = self
            .hosting
            .list_pull_request_files(&self.repository, self.pull_request)
            .await?;

        let mut reviews = Vec::new();
        for file in files.into_iter().filter(|f| self.wants(&f.filename)) {
            let request = CodeReviewRequest {
                file_name: file.filename.clone(),
                file_content: file.raw_url.clone(),
                diff: file.patch.clone().unwrap_or_default(),
            };
            let verdict = match self.inference.review_code(&self.settings.model, &request).await {
                Ok(feedback) => ReviewVerdict::Feedback(feedback),
                Err(e) => {
                    warn!(file = %file.filename, error = %e, "Code review failed");
                    ReviewVerdict::Error(e.to_string())
                }
            };
            reviews.push(FileReview {
                file: file.filename,
                verdict,
            });
        }

        info!(
            repository = %self.repository,
            pull_request = self.pull_request,
            reviewed = reviews.len(),
            "Code review finished"
        );
        Ok(reviews)
    }

    /// Posts one comment per review.
    ///
    /// # Errors
    ///
    /// Stops at the first comment that cannot be posted.
    pub async fn post_feedback(&self, reviews: &[FileReview]) -> Result<usize, AdapterError> {
        for review in reviews {
            self.hosting
                .post_comment(&self.repository, self.pull_request, &review.to_comment())
                .await?;
        }
        Ok(reviews.len())
    }

    /// Reviews the pull request and posts the feedback.
    ///
    /// # Errors
    ///
    /// See [`CodeReviewer::review`] and [`CodeReviewer::post_feedback`].
    pub async fn run(&self) -> Result<Vec<FileReview>, AdapterError> {
        let reviews = self.review().await?;
        self.post_feedback(&reviews).await?;
        Ok(reviews)
    }
}

/// Checks that the review and chat endpoints can be called.
pub(super) fn require_inference_credentials(config: &PipelineConfig) -> Result<(), ConfigError> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    if !present(&config.inference.endpoint) {
        return Err(ConfigError::missing("GROQ_API_ENDPOINT"));
    }
    if !present(&config.inference.api_key) {
        return Err(ConfigError::missing("GROQ_API_KEY"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChangedFile, MockSourceHosting, ReviewIssue};
    use crate::testing::ScriptedInference;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn changed(filename: &str) -> ChangedFile {
        ChangedFile {
            filename: filename.to_string(),
            patch: Some("@@ -1 +1 @@\n-a\n+b".to_string()),
            raw_url: format!("https://raw.example/{filename}"),
            status: "modified".to_string(),
        }
    }

    fn feedback() -> CodeReviewFeedback {
        CodeReviewFeedback {
            issues: vec![ReviewIssue {
                description: "Unused import".to_string(),
                line: None,
                severity: None,
            }],
            suggestions: vec!["Add type hints".to_string()],
            overall_quality: "Good".to_string(),
        }
    }

    #[test]
    fn test_feedback_comment_format() {
        let review = FileReview {
            file: "app.py".to_string(),
            verdict: ReviewVerdict::Feedback(feedback()),
        };
        assert_eq!(
            review.to_comment(),
            "### 📝 Code Review for `app.py`\n\n**Overall Quality**: Good\n\n**Issues Found**:\n- Unused import\n\n**Suggestions**:\n- Add type hints"
        );
    }

    #[test]
    fn test_error_comment_format() {
        let review = FileReview {
            file: "app.py".to_string(),
            verdict: ReviewVerdict::Error("timeout".to_string()),
        };
        assert_eq!(review.to_comment(), "⚠️ **Code Review Error**: `app.py`: timeout");
    }

    #[tokio::test]
    async fn test_reviews_matching_files_and_posts_each() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&posted);

        let mut hosting = MockSourceHosting::new();
        hosting
            .expect_list_pull_request_files()
            .withf(|repo, number| repo.to_string() == "acme/site" && *number == 7)
            .times(1)
            .returning(|_, _| Ok(vec![changed("app.py"), changed("README.md"), changed("lib/util.py")]));
        hosting
            .expect_post_comment()
            .times(2)
            .returning(move |_, _, body| {
                sink.lock().push(body.to_string());
                Ok(())
            });

        let inference = Arc::new(
            ScriptedInference::new()
                .with_review(Ok(feedback()))
                .with_review(Err(AdapterError::Status {
                    service: "inference",
                    code: 502,
                    body: "bad gateway".to_string(),
                })),
        );
        let reviewer = CodeReviewer::new(
            inference.clone(),
            Arc::new(hosting),
            ReviewSettings::default(),
            "acme/site",
            7,
        );

        let reviews = reviewer.run().await.unwrap();

        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].file, "app.py");
        assert!(matches!(reviews[0].verdict, ReviewVerdict::Feedback(_)));
        assert_eq!(reviews[1].file, "lib/util.py");
        assert!(matches!(&reviews[1].verdict, ReviewVerdict::Error(e) if e.contains("502")));

        let requests = inference.review_requests();
        assert_eq!(requests[0].0, "llama3-8b-8192");
        assert_eq!(requests[0].1.file_content, "https://raw.example/app.py");
        assert!(requests[0].1.diff.contains("+b"));

        let posted = posted.lock().clone();
        assert!(posted[0].starts_with("### 📝 Code Review for `app.py`"));
        assert!(posted[1].starts_with("⚠️ **Code Review Error**"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_returned() {
        let mut hosting = MockSourceHosting::new();
        hosting.expect_list_pull_request_files().returning(|_, _| {
            Err(AdapterError::Status {
                service: "source-hosting",
                code: 404,
                body: "Not Found".to_string(),
            })
        });
        hosting.expect_post_comment().times(0);

        let reviewer = CodeReviewer::new(
            Arc::new(ScriptedInference::new()),
            Arc::new(hosting),
            ReviewSettings::default(),
            "acme/site",
            7,
        );

        assert!(matches!(
            reviewer.run().await,
            Err(AdapterError::Status { code: 404, .. })
        ));
    }

    #[test]
    fn test_from_config_requires_pull_request() {
        let err = CodeReviewer::from_config(&PipelineConfig::default(), Arc::new(CancellationToken::new()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_from_config_requires_inference_credentials() {
        let mut config = PipelineConfig::default();
        config.source_hosting.repository = Some("acme/site".to_string());
        config.source_hosting.pull_request = Some(1);
        config.source_hosting.token = Some("t".to_string());

        let err = CodeReviewer::from_config(&config, Arc::new(CancellationToken::new()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("GROQ_API_ENDPOINT"));
    }
}
