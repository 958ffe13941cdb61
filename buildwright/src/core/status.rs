//! Phase identifiers and statuses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four fixed phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Generate and persist the CI workflow definition.
    CiWorkflow,
    /// Generate and persist the container build file.
    ContainerFile,
    /// Build the image and inspect whether the tag exists.
    BuildImage,
    /// Ask the inference backend for a build-health prediction.
    Predict,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Self; 4] = [
        Self::CiWorkflow,
        Self::ContainerFile,
        Self::BuildImage,
        Self::Predict,
    ];

    /// Returns the 1-based position of the phase in a run.
    #[must_use]
    pub fn ordinal(self) -> usize {
        match self {
            Self::CiWorkflow => 1,
            Self::ContainerFile => 2,
            Self::BuildImage => 3,
            Self::Predict => 4,
        }
    }

    /// Returns the snake_case identifier used in events and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CiWorkflow => "ci_workflow",
            Self::ContainerFile => "container_file",
            Self::BuildImage => "build_image",
            Self::Predict => "predict",
        }
    }

    /// Returns a human-readable title for status lines.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::CiWorkflow => "CI workflow",
            Self::ContainerFile => "Container build file",
            Self::BuildImage => "Image build",
            Self::Predict => "Build prediction",
        }
    }

    /// Phases whose failure means this phase must not run.
    ///
    /// Building after a failed build-file write would build a stale file.
    /// The prediction has no hard dependency: it receives explicit
    /// `Unavailable` markers instead.
    #[must_use]
    pub fn hard_dependencies(self) -> &'static [Self] {
        match self {
            Self::BuildImage => &[Self::ContainerFile],
            Self::CiWorkflow | Self::ContainerFile | Self::Predict => &[],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a phase as recorded in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// The phase produced its payload.
    Ok,
    /// The phase failed, was skipped or was cancelled.
    Failed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
