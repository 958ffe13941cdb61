//! Image build and inspection.
//!
//! [`BuildExecutor`] turns raw engine results into the domain model: a build
//! either yields its log or an [`ExecError`], and an inspection always yields
//! an [`ImageStatus`], never claiming presence when the check itself failed.

mod engine;

pub use engine::{ContainerEngine, DockerCli, ProcessOutput};

use crate::cancellation::CancellationToken;
use crate::config::BuildSettings;
use crate::core::{Absence, BuildLog, BuildOutcome, ImageStatus};
use crate::errors::ExecError;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Longest tail of process output kept in an error.
const MAX_ERROR_OUTPUT_CHARS: usize = 2000;

/// Builds and inspects images through a [`ContainerEngine`].
pub struct BuildExecutor {
    engine: Arc<dyn ContainerEngine>,
    settings: BuildSettings,
}

impl BuildExecutor {
    /// Creates an executor over `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn ContainerEngine>, settings: BuildSettings) -> Self {
        Self { engine, settings }
    }

    /// Creates an executor driving the configured engine CLI.
    #[must_use]
    pub fn from_settings(settings: BuildSettings, token: Arc<CancellationToken>) -> Self {
        let engine = DockerCli::new(settings.engine.clone(), settings.timeout(), token);
        Self::new(Arc::new(engine), settings)
    }

    /// Returns the build settings.
    #[must_use]
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Runs `<engine> build -t <tag> -f <build_file> <context>`.
    ///
    /// # Errors
    ///
    /// `NonZeroExit` carries the exit code and the tail of the captured
    /// output. Launch, signal, deadline and cancellation errors pass through.
    #[instrument(skip(self), fields(engine = %self.settings.engine))]
    pub async fn build_image(&self, tag: &str, build_file: &Path) -> Result<BuildLog, ExecError> {
        let output = self.engine.build(tag, build_file, &self.settings.context).await?;
        let log = BuildLog::new(output.stdout, output.stderr);
        let command = format!(
            "{} build -t {tag} -f {} {}",
            self.settings.engine,
            build_file.display(),
            self.settings.context.display()
        );

        match output.code {
            Some(0) => {
                info!(tag, "Image build succeeded");
                Ok(log)
            }
            Some(code) => {
                warn!(tag, code, "Image build failed");
                Err(ExecError::NonZeroExit {
                    command,
                    code,
                    output: tail(&log.combined(), MAX_ERROR_OUTPUT_CHARS),
                })
            }
            None => Err(ExecError::Signalled {
                command,
                output: tail(&log.combined(), MAX_ERROR_OUTPUT_CHARS),
            }),
        }
    }

    /// Runs `<engine> inspect <tag>`.
    ///
    /// Exit 0 is `Present`; any other exit is `Absent(NotFound)`; anything
    /// that prevented a verdict is `Absent(CheckError)`.
    #[instrument(skip(self), fields(engine = %self.settings.engine))]
    pub async fn inspect_image(&self, tag: &str) -> ImageStatus {
        let status = match self.engine.inspect(tag).await {
            Ok(output) if output.success() => ImageStatus::Present,
            Ok(ProcessOutput {
                code: Some(code),
                stderr,
                ..
            }) => {
                let detail = match stderr.trim() {
                    "" => format!("image '{tag}' not found (exit code {code})"),
                    msg => msg.to_string(),
                };
                ImageStatus::Absent(Absence::NotFound { detail })
            }
            Ok(ProcessOutput { code: None, .. }) => ImageStatus::Absent(Absence::CheckError {
                diagnostic: format!("inspect of '{tag}' was terminated by a signal"),
            }),
            Err(e) => ImageStatus::Absent(Absence::CheckError {
                diagnostic: e.to_string(),
            }),
        };
        info!(tag, present = status.is_present(), "Image inspected");
        status
    }

    /// Builds `tag` from `build_file` and then inspects it.
    ///
    /// # Errors
    ///
    /// Only the build can fail; an inspection problem becomes
    /// `BuildStatus::CheckFailed` inside the outcome.
    pub async fn build_and_inspect(&self, tag: &str, build_file: &Path) -> Result<BuildOutcome, ExecError> {
        let log = self.build_image(tag, build_file).await?;
        let inspection = self.inspect_image(tag).await;
        Ok(BuildOutcome::from_inspection(tag, log, &inspection))
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map_or(0, |(i, _)| i);
    format!("...{}", &text[start..])
}
