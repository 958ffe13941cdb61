//! Adapters for the external services a run talks to.
//!
//! - [`inference`]: the language-model backend
//! - [`source_hosting`]: pull-request files and comments

pub mod inference;
pub mod source_hosting;

pub use inference::{
    ChatCompletionRequest, ChatMessage, ChatReply, ChatRequest, CodeReviewFeedback,
    CodeReviewRequest, HttpInferenceClient, InferenceClient, ReviewIssue,
};
pub use source_hosting::{ChangedFile, GitHubClient, SourceHosting};

#[cfg(test)]
pub use source_hosting::MockSourceHosting;

/// Longest response body kept in an error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Truncates an error response body on a character boundary.
pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  short "), "short");
        let long = "é".repeat(600);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }
}
