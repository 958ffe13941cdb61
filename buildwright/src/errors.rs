//! Error types for buildwright.
//!
//! Library code returns these typed errors. The orchestrator folds every one of
//! them into a `StageResult::Failed` at the phase boundary, so none of them can
//! abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// The umbrella error a pipeline phase can produce.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration was missing or invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// An external process (container engine) failed.
    #[error("{0}")]
    Exec(#[from] ExecError),

    /// An external service adapter failed.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// An artifact could not be persisted.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// A build report was submitted with a field left unset.
    #[error("Build report is incomplete: missing '{0}'")]
    IncompleteReport(&'static str),

    /// The prediction stage reported an error result.
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// The stage panicked; the payload message is preserved.
    #[error("Stage panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Returns a stable, machine-readable name for the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Exec(_) => "external_process",
            Self::Adapter(err) if err.is_validation() => "adapter_validation",
            Self::Adapter(_) => "adapter_transport",
            Self::Persistence(_) => "persistence",
            Self::IncompleteReport(_) => "incomplete_report",
            Self::Prediction(_) => "prediction",
            Self::Panicked(_) => "panic",
        }
    }
}

/// Errors raised while assembling configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("Missing configuration: {field}")]
    Missing {
        /// The setting name (config key or environment variable).
        field: String,
    },

    /// A setting was provided but could not be interpreted.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// The setting name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Failed to load config file {}: {message}", path.display())]
    File {
        /// Path of the file.
        path: PathBuf,
        /// The underlying read or parse error.
        message: String,
    },
}

impl ConfigError {
    /// Creates a missing-setting error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing { field: field.into() }
    }

    /// Creates an invalid-setting error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors from invoking the container engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// The process ran and exited with a non-zero code.
    #[error("`{command}` exited with code {code}: {output}")]
    NonZeroExit {
        /// The command line that was run.
        command: String,
        /// The exit code.
        code: i32,
        /// Captured stdout and stderr.
        output: String,
    },

    /// The process could not be started or awaited.
    #[error("Failed to launch `{command}`: {message}")]
    Launch {
        /// The command line.
        command: String,
        /// The OS error.
        message: String,
    },

    /// The process was terminated by a signal.
    #[error("`{command}` was terminated by a signal: {output}")]
    Signalled {
        /// The command line.
        command: String,
        /// Captured output before termination.
        output: String,
    },

    /// The per-call deadline expired; the process was killed.
    #[error("`{command}` exceeded its deadline of {seconds}s")]
    DeadlineExceeded {
        /// The command line.
        command: String,
        /// The deadline in seconds.
        seconds: u64,
    },

    /// The run was cancelled while the process was running.
    #[error("`{command}` cancelled: {reason}")]
    Cancelled {
        /// The command line.
        command: String,
        /// The cancellation reason.
        reason: String,
    },
}

/// Errors from the inference and source-hosting adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The request never produced an HTTP response.
    #[error("Transport error calling {service}: {message}")]
    Transport {
        /// The service name.
        service: &'static str,
        /// The transport error.
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {code}: {body}")]
    Status {
        /// The service name.
        service: &'static str,
        /// The HTTP status code.
        code: u16,
        /// A truncated copy of the response body.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("Invalid response from {service}: {message}")]
    Validation {
        /// The service name.
        service: &'static str,
        /// What did not validate.
        message: String,
    },

    /// The per-call deadline expired.
    #[error("{service} call exceeded its deadline of {seconds}s")]
    DeadlineExceeded {
        /// The service name.
        service: &'static str,
        /// The deadline in seconds.
        seconds: u64,
    },

    /// The run was cancelled during the call.
    #[error("{service} call cancelled: {reason}")]
    Cancelled {
        /// The service name.
        service: &'static str,
        /// The cancellation reason.
        reason: String,
    },

    /// A credential or endpoint required for the call is not configured.
    #[error("Missing credential for {service}: {field}")]
    MissingCredential {
        /// The service name.
        service: &'static str,
        /// The missing setting.
        field: &'static str,
    },
}

impl AdapterError {
    /// Returns true if the response arrived but did not validate.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns the name of the service that failed.
    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Validation { service, .. }
            | Self::DeadlineExceeded { service, .. }
            | Self::Cancelled { service, .. }
            | Self::MissingCredential { service, .. } => service,
        }
    }
}

/// Raised when an artifact cannot be written.
#[derive(Debug, Error)]
#[error("Failed to write artifact to {}: {source}", path.display())]
pub struct PersistenceError {
    /// Destination path.
    pub path: PathBuf,
    /// The I/O error.
    #[source]
    pub source: std::io::Error,
}

impl PersistenceError {
    /// Creates a new persistence error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}
