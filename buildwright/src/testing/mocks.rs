//! Scripted collaborators for exercising the pipeline without a container
//! engine, network or filesystem.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::{
    ChatCompletionRequest, ChatReply, ChatRequest, CodeReviewFeedback, CodeReviewRequest,
    InferenceClient,
};
use crate::core::{GeneratedArtifact, PersistedArtifact};
use crate::errors::{AdapterError, ExecError, PersistenceError};
use crate::executor::{ContainerEngine, ProcessOutput};
use crate::persistence::ArtifactWriter;

/// A container engine that replays scripted results.
///
/// Unscripted calls succeed with exit code 0.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    builds: Mutex<VecDeque<Result<ProcessOutput, ExecError>>>,
    inspects: Mutex<VecDeque<Result<ProcessOutput, ExecError>>>,
    build_calls: Mutex<Vec<String>>,
    build_files: Mutex<Vec<PathBuf>>,
    inspect_calls: Mutex<Vec<String>>,
    build_delay: Option<Duration>,
    panic_on_build: bool,
}

impl ScriptedEngine {
    /// Creates an engine where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a build result.
    #[must_use]
    pub fn with_build(self, result: Result<ProcessOutput, ExecError>) -> Self {
        self.builds.lock().push_back(result);
        self
    }

    /// Queues an inspect result.
    #[must_use]
    pub fn with_inspect(self, result: Result<ProcessOutput, ExecError>) -> Self {
        self.inspects.lock().push_back(result);
        self
    }

    /// Makes every build sleep first.
    #[must_use]
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    /// Makes every build panic.
    #[must_use]
    pub fn panicking_on_build(mut self) -> Self {
        self.panic_on_build = true;
        self
    }

    /// Tags passed to `build`, in call order.
    #[must_use]
    pub fn build_calls(&self) -> Vec<String> {
        self.build_calls.lock().clone()
    }

    /// Build files passed to `build`, in call order.
    #[must_use]
    pub fn build_files(&self) -> Vec<PathBuf> {
        self.build_files.lock().clone()
    }

    /// Tags passed to `inspect`, in call order.
    #[must_use]
    pub fn inspect_calls(&self) -> Vec<String> {
        self.inspect_calls.lock().clone()
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn build(&self, tag: &str, build_file: &Path, _context: &Path) -> Result<ProcessOutput, ExecError> {
        self.build_calls.lock().push(tag.to_string());
        self.build_files.lock().push(build_file.to_path_buf());
        if self.panic_on_build {
            panic!("engine exploded while building {tag}");
        }
        if let Some(delay) = self.build_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.builds.lock().pop_front();
        next.unwrap_or_else(|| Ok(ProcessOutput::exited(0, "", "")))
    }

    async fn inspect(&self, tag: &str) -> Result<ProcessOutput, ExecError> {
        self.inspect_calls.lock().push(tag.to_string());
        let next = self.inspects.lock().pop_front();
        next.unwrap_or_else(|| Ok(ProcessOutput::exited(0, "[]", "")))
    }
}

/// An inference client that replays scripted answers and records requests.
#[derive(Debug, Default)]
pub struct ScriptedInference {
    completions: Mutex<VecDeque<Result<String, AdapterError>>>,
    reviews: Mutex<VecDeque<Result<CodeReviewFeedback, AdapterError>>>,
    chats: Mutex<VecDeque<Result<ChatReply, AdapterError>>>,
    completion_requests: Mutex<Vec<ChatCompletionRequest>>,
    review_requests: Mutex<Vec<(String, CodeReviewRequest)>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedInference {
    /// Creates a client with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a completion result.
    #[must_use]
    pub fn with_completion(self, result: Result<String, AdapterError>) -> Self {
        self.completions.lock().push_back(result);
        self
    }

    /// Queues a code review result.
    #[must_use]
    pub fn with_review(self, result: Result<CodeReviewFeedback, AdapterError>) -> Self {
        self.reviews.lock().push_back(result);
        self
    }

    /// Queues a chat result.
    #[must_use]
    pub fn with_chat(self, result: Result<ChatReply, AdapterError>) -> Self {
        self.chats.lock().push_back(result);
        self
    }

    /// Completion requests received.
    #[must_use]
    pub fn completion_requests(&self) -> Vec<ChatCompletionRequest> {
        self.completion_requests.lock().clone()
    }

    /// Review requests received, with the model asked.
    #[must_use]
    pub fn review_requests(&self) -> Vec<(String, CodeReviewRequest)> {
        self.review_requests.lock().clone()
    }

    /// Chat requests received.
    #[must_use]
    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().clone()
    }

    fn unscripted() -> AdapterError {
        AdapterError::Transport {
            service: "inference",
            message: "no scripted response".to_string(),
        }
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AdapterError> {
        self.completion_requests.lock().push(request.clone());
        let next = self.completions.lock().pop_front();
        next.unwrap_or_else(|| Err(Self::unscripted()))
    }

    async fn review_code(
        &self,
        model: &str,
        request: &CodeReviewRequest,
    ) -> Result<CodeReviewFeedback, AdapterError> {
        self.review_requests
            .lock()
            .push((model.to_string(), request.clone()));
        let next = self.reviews.lock().pop_front();
        next.unwrap_or_else(|| Err(Self::unscripted()))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AdapterError> {
        self.chat_requests.lock().push(request.clone());
        let next = self.chats.lock().pop_front();
        next.unwrap_or_else(|| Err(Self::unscripted()))
    }
}

/// Keeps written artifacts in memory. Writes to paths registered with
/// [`MemoryArtifactWriter::failing_on`] fail with `PermissionDenied`.
#[derive(Debug, Default)]
pub struct MemoryArtifactWriter {
    files: Mutex<BTreeMap<PathBuf, String>>,
    failing: HashSet<PathBuf>,
}

impl MemoryArtifactWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes writes to `path` fail.
    #[must_use]
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Returns the content written to `path`.
    #[must_use]
    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    /// Returns the written paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ArtifactWriter for MemoryArtifactWriter {
    async fn write(&self, artifact: &GeneratedArtifact) -> Result<PersistedArtifact, PersistenceError> {
        if self.failing.contains(&artifact.path) {
            return Err(PersistenceError::new(
                &artifact.path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
            ));
        }
        self.files
            .lock()
            .insert(artifact.path.clone(), artifact.content.clone());
        Ok(PersistedArtifact::new(artifact, &artifact.path))
    }
}
