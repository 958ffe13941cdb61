//! Source-hosting adapter: pull-request file listing and comment posting.

use super::truncate_body;
use crate::config::SourceHostingSettings;
use crate::errors::AdapterError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "source-hosting";
const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "buildwright";

/// A file changed by a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path in the repository.
    pub filename: String,
    /// Unified diff; absent for binary or very large files.
    #[serde(default)]
    pub patch: Option<String>,
    /// URL of the raw file content at the head commit.
    #[serde(default)]
    pub raw_url: String,
    /// `added`, `modified`, `removed`, ...
    #[serde(default)]
    pub status: String,
}

/// Pull-request operations used by the review assistants.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceHosting: Send + Sync {
    /// Lists every file changed by pull request `number` in `repository`.
    async fn list_pull_request_files(
        &self,
        repository: &str,
        number: u64,
    ) -> Result<Vec<ChangedFile>, AdapterError>;

    /// Posts `body` as a comment on pull request `number`.
    async fn post_comment(&self, repository: &str, number: u64, body: &str) -> Result<(), AdapterError>;
}

/// GitHub REST implementation of [`SourceHosting`].
pub struct GitHubClient {
    http_client: Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::MissingCredential` without a token, or
    /// `AdapterError::Transport` if the HTTP client cannot be built.
    pub fn new(settings: &SourceHostingSettings) -> Result<Self, AdapterError> {
        let token = settings
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(AdapterError::MissingCredential {
                service: SERVICE,
                field: "GITHUB_TOKEN",
            })?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AdapterError::Transport {
                service: SERVICE,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http_client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn map_send_error(e: reqwest::Error) -> AdapterError {
        if e.is_timeout() {
            AdapterError::DeadlineExceeded {
                service: SERVICE,
                seconds: REQUEST_TIMEOUT_SECS,
            }
        } else {
            AdapterError::Transport {
                service: SERVICE,
                message: e.to_string(),
            }
        }
    }

    async fn check_status(response: Response) -> Result<Response, AdapterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AdapterError::Status {
            service: SERVICE,
            code: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

#[async_trait]
impl SourceHosting for GitHubClient {
    async fn list_pull_request_files(
        &self,
        repository: &str,
        number: u64,
    ) -> Result<Vec<ChangedFile>, AdapterError> {
        let url = format!("{}/repos/{repository}/pulls/{number}/files", self.api_base);
        let mut files = Vec::new();
        let mut page = 1usize;

        loop {
            debug!(url = %url, page, "Listing pull request files");
            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await
                .map_err(Self::map_send_error)?;
            let response = Self::check_status(response).await?;

            let batch: Vec<ChangedFile> = response.json().await.map_err(|e| AdapterError::Validation {
                service: SERVICE,
                message: format!("unexpected file listing: {e}"),
            })?;

            let last_page = batch.len() < PER_PAGE;
            files.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }

        info!(repository, number, files = files.len(), "Fetched pull request files");
        Ok(files)
    }

    async fn post_comment(&self, repository: &str, number: u64, body: &str) -> Result<(), AdapterError> {
        let url = format!("{}/repos/{repository}/issues/{number}/comments", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(Self::map_send_error)?;
        Self::check_status(response).await?;

        info!(repository, number, chars = body.len(), "Posted pull request comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FILES_PATH: &str = "/repos/acme/site/pulls/7/files";

    fn settings(server: &ServerGuard) -> SourceHostingSettings {
        SourceHostingSettings {
            api_base: server.url(),
            token: Some("ghp_test".to_string()),
            repository: Some("acme/site".to_string()),
            pull_request: Some(7),
        }
    }

    fn file_page(count: usize, offset: usize) -> String {
        let files: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                json!({
                    "filename": format!("src/f{}.py", i + offset),
                    "patch": "@@ -1 +1 @@",
                    "raw_url": format!("https://raw/f{}.py", i + offset),
                    "status": "modified"
                })
            })
            .collect();
        serde_json::to_string(&files).unwrap()
    }

    fn page_query(page: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), page.into()),
        ])
    }

    #[test]
    fn test_requires_token() {
        let err = GitHubClient::new(&SourceHostingSettings::default()).err().unwrap();
        assert_eq!(
            err,
            AdapterError::MissingCredential {
                service: "source-hosting",
                field: "GITHUB_TOKEN"
            }
        );
    }

    #[tokio::test]
    async fn test_lists_files_across_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", FILES_PATH)
            .match_query(page_query("1"))
            .match_header("authorization", "Bearer ghp_test")
            .match_header("user-agent", "buildwright")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(file_page(100, 0))
            .create_async()
            .await;
        let second = server
            .mock("GET", FILES_PATH)
            .match_query(page_query("2"))
            .match_header("authorization", "Bearer ghp_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(file_page(2, 100))
            .create_async()
            .await;
        let client = GitHubClient::new(&settings(&server)).unwrap();

        let files = client.list_pull_request_files("acme/site", 7).await.unwrap();
        assert_eq!(files.len(), 102);
        assert_eq!(files[101].filename, "src/f101.py");

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_patch_is_tolerated() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", FILES_PATH)
            .match_query(page_query("1"))
            .with_status(200)
            .with_body(r#"[{"filename":"logo.png","raw_url":"https://raw/logo.png","status":"added"}]"#)
            .create_async()
            .await;
        let client = GitHubClient::new(&settings(&server)).unwrap();

        let files = client.list_pull_request_files("acme/site", 7).await.unwrap();
        assert_eq!(files[0].patch, None);
    }

    #[tokio::test]
    async fn test_not_found_is_status_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", FILES_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;
        let client = GitHubClient::new(&settings(&server)).unwrap();

        let err = client.list_pull_request_files("acme/site", 7).await.unwrap_err();
        assert!(matches!(err, AdapterError::Status { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_post_comment() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/acme/site/issues/7/comments")
            .match_header("authorization", "Bearer ghp_test")
            .match_body(Matcher::Json(json!({"body": "hello"})))
            .with_status(201)
            .with_body(r#"{"id":1}"#)
            .create_async()
            .await;
        let client = GitHubClient::new(&settings(&server)).unwrap();

        client.post_comment("acme/site", 7, "hello").await.unwrap();

        mock.assert_async().await;
    }
}
