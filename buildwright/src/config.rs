//! Run configuration.
//!
//! A [`PipelineConfig`] is assembled once at process start (TOML file, then
//! environment overrides, then defaults for whatever is still unset) and is
//! handed to stage constructors by reference. Nothing below this module reads
//! the process environment.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for every command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CI workflow generator settings.
    pub workflow: WorkflowSettings,
    /// Container build file generator settings.
    pub container_file: ContainerFileSettings,
    /// Image build settings.
    pub build: BuildSettings,
    /// Prediction settings.
    pub prediction: PredictionSettings,
    /// Inference backend connection.
    pub inference: InferenceSettings,
    /// Source hosting connection.
    pub source_hosting: SourceHostingSettings,
    /// Pull-request review settings.
    pub review: ReviewSettings,
    /// Where generated artifacts go.
    pub output: OutputSettings,
}

/// Settings for the CI workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Workflow display name.
    #[serde(default = "default_workflow_name")]
    pub workflow_name: String,
    /// Version passed to the runtime setup step.
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,
    /// Whether a test step is emitted.
    #[serde(default = "default_run_tests")]
    pub run_tests: bool,
    /// Branch that triggers the workflow.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Host port the smoke-test container publishes.
    #[serde(default = "default_port")]
    pub host_port: u16,
    /// Container port the smoke-test container publishes.
    #[serde(default = "default_port")]
    pub container_port: u16,
    /// Paths that must answer 200 once the container runs.
    #[serde(default = "default_smoke_endpoints")]
    pub smoke_endpoints: Vec<String>,
    /// Command that runs this pipeline inside CI.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    /// Secret holding the inference endpoint.
    #[serde(default = "default_endpoint_secret")]
    pub endpoint_secret: String,
    /// Secret holding the inference API key.
    #[serde(default = "default_api_key_secret")]
    pub api_key_secret: String,
    /// Secret holding the source-hosting token.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

fn default_workflow_name() -> String {
    "CI Pipeline".to_string()
}

fn default_runtime_version() -> String {
    "3.13.0".to_string()
}

fn default_run_tests() -> bool {
    true
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_smoke_endpoints() -> Vec<String> {
    vec!["talkitdoit.html".to_string(), "index.html".to_string()]
}

fn default_entrypoint() -> String {
    "python main.py".to_string()
}

fn default_endpoint_secret() -> String {
    "GROQ_API_ENDPOINT".to_string()
}

fn default_api_key_secret() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_token_secret() -> String {
    "GH_TOKEN".to_string()
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            workflow_name: default_workflow_name(),
            runtime_version: default_runtime_version(),
            run_tests: default_run_tests(),
            branch: default_branch(),
            host_port: default_port(),
            container_port: default_port(),
            smoke_endpoints: default_smoke_endpoints(),
            entrypoint: default_entrypoint(),
            endpoint_secret: default_endpoint_secret(),
            api_key_secret: default_api_key_secret(),
            token_secret: default_token_secret(),
        }
    }
}

/// Settings for the container build file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerFileSettings {
    /// `FROM` image. Passed through verbatim.
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// `EXPOSE` port.
    #[serde(default = "default_port")]
    pub expose_port: u16,
    /// Source copied into the work dir.
    #[serde(default = "default_copy_source")]
    pub copy_source: String,
    /// `WORKDIR`.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    /// `CMD` in exec form.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
}

fn default_base_image() -> String {
    "nginx:alpine".to_string()
}

fn default_copy_source() -> String {
    "./html".to_string()
}

fn default_work_dir() -> String {
    "/usr/share/nginx/html".to_string()
}

fn default_command() -> Vec<String> {
    vec!["nginx".to_string(), "-g".to_string(), "daemon off;".to_string()]
}

impl Default for ContainerFileSettings {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            expose_port: default_port(),
            copy_source: default_copy_source(),
            work_dir: default_work_dir(),
            command: default_command(),
        }
    }
}

/// Settings for the image build and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Container engine executable.
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Tag to build and inspect.
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    /// Build context directory.
    #[serde(default = "default_context")]
    pub context: PathBuf,
    /// Per-process deadline in seconds.
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,
}

fn default_engine() -> String {
    "docker".to_string()
}

fn default_image_tag() -> String {
    "myapp:latest".to_string()
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_timeout() -> u64 {
    600
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            image_tag: default_image_tag(),
            context: default_context(),
            timeout_secs: default_build_timeout(),
        }
    }
}

impl BuildSettings {
    /// Returns the per-process deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the build-health prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSettings {
    /// Model asked for the prediction.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "llama3-8b-8192".to_string()
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
        }
    }
}

/// Connection to the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// OpenAI-style chat completions URL.
    #[serde(default = "default_completions_url")]
    pub completions_url: String,
    /// Base URL of the code-review and chat endpoints.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Per-call deadline in seconds.
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

fn default_completions_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_inference_timeout() -> u64 {
    60
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            completions_url: default_completions_url(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_inference_timeout(),
        }
    }
}

impl InferenceSettings {
    /// Returns the per-call deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Connection to the source-hosting API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHostingSettings {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Access token.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Repository as `owner/name`.
    #[serde(default)]
    pub repository: Option<String>,
    /// Pull request number.
    #[serde(default)]
    pub pull_request: Option<u64>,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for SourceHostingSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            repository: None,
            pull_request: None,
        }
    }
}

impl SourceHostingSettings {
    /// Returns the configured repository and pull request number.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for whichever is unset.
    pub fn pull_request_ref(&self) -> Result<(&str, u64), ConfigError> {
        let repository = self
            .repository
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ConfigError::missing("source_hosting.repository"))?;
        let number = self
            .pull_request
            .ok_or_else(|| ConfigError::missing("source_hosting.pull_request"))?;
        Ok((repository, number))
    }
}

/// Settings for pull-request review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSettings {
    /// Model asked for reviews.
    #[serde(default = "default_model")]
    pub model: String,
    /// File suffixes that get reviewed.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec![".py".to_string()]
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            extensions: default_extensions(),
        }
    }
}

/// Where generated artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory relative paths are resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Workflow definition path.
    #[serde(default = "default_workflow_path")]
    pub workflow_path: PathBuf,
    /// Container build file path.
    #[serde(default = "default_container_file_path")]
    pub container_file_path: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_workflow_path() -> PathBuf {
    PathBuf::from(".github/workflows/ci.yml")
}

fn default_container_file_path() -> PathBuf {
    PathBuf::from("Dockerfile")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            workflow_path: default_workflow_path(),
            container_file_path: default_container_file_path(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from an optional TOML file. A missing path yields
    /// the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::File` if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Invalid { message, .. } => ConfigError::File {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on a parse error.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::invalid("config", e.to_string()))
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// Recognised variables: `GROQ_API_ENDPOINT`, `GROQ_API_KEY`,
    /// `GITHUB_TOKEN` and the `BUILDWRIGHT_*` family.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GROQ_API_ENDPOINT") {
            self.inference.endpoint = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = get("GROQ_API_KEY") {
            self.inference.api_key = Some(v);
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.source_hosting.token = Some(v);
        }
        if let Some(v) = get("BUILDWRIGHT_COMPLETIONS_URL") {
            self.inference.completions_url = v;
        }
        if let Some(v) = get("BUILDWRIGHT_MODEL") {
            self.prediction.model.clone_from(&v);
            self.review.model = v;
        }
        if let Some(v) = get("BUILDWRIGHT_ENGINE") {
            self.build.engine = v;
        }
        if let Some(v) = get("BUILDWRIGHT_IMAGE_TAG") {
            self.build.image_tag = v;
        }
        if let Some(v) = get("BUILDWRIGHT_RUNTIME_VERSION") {
            self.workflow.runtime_version = v;
        }
        if let Some(v) = get("BUILDWRIGHT_OUTPUT_ROOT") {
            self.output.root = PathBuf::from(v);
        }
        if let Some(v) = get("BUILDWRIGHT_REPOSITORY") {
            self.source_hosting.repository = Some(v);
        }
        if let Some(v) = get("BUILDWRIGHT_BUILD_TIMEOUT_SECS") {
            self.build.timeout_secs = parse_number("BUILDWRIGHT_BUILD_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("BUILDWRIGHT_PULL_REQUEST") {
            self.source_hosting.pull_request = Some(parse_number("BUILDWRIGHT_PULL_REQUEST", &v)?);
        }
        Ok(())
    }

    /// Checks the settings every run depends on.
    ///
    /// Credentials are not checked here; their consumers fail fast instead.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.image_tag.trim().is_empty() {
            return Err(ConfigError::invalid("build.image_tag", "must not be empty"));
        }
        if self.build.engine.trim().is_empty() {
            return Err(ConfigError::invalid("build.engine", "must not be empty"));
        }
        if self.build.timeout_secs == 0 {
            return Err(ConfigError::invalid("build.timeout_secs", "must be positive"));
        }
        if self.inference.timeout_secs == 0 {
            return Err(ConfigError::invalid("inference.timeout_secs", "must be positive"));
        }
        if self.container_file.command.is_empty() {
            return Err(ConfigError::invalid("container_file.command", "must not be empty"));
        }
        Ok(())
    }
}

fn parse_number(field: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("expected a number, got '{value}'")))
}
