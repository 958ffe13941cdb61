//! Build and inspection outcome types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Captured output of an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLog {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl BuildLog {
    /// Creates a new build log.
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns stdout and stderr joined, skipping empty streams.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Why an image is considered absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Absence {
    /// The engine ran and reported the tag as unknown.
    NotFound {
        /// The engine's own message.
        detail: String,
    },
    /// The inspection could not be carried out at all.
    CheckError {
        /// What went wrong (launch failure, signal, deadline, cancellation).
        diagnostic: String,
    },
}

/// Result of inspecting an image tag. Two-state by the engine's contract:
/// errors collapse to `Absent` and never to `Present`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// The tag exists locally.
    Present,
    /// The tag does not exist or could not be checked.
    Absent(Absence),
}

impl ImageStatus {
    /// Returns true if the image exists.
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }

    /// Returns the attached diagnostic for an absent image.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Present => None,
            Self::Absent(Absence::NotFound { detail }) => Some(detail),
            Self::Absent(Absence::CheckError { diagnostic }) => Some(diagnostic),
        }
    }
}

/// Tri-state status of one build-and-inspect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Build completed and the tag is present.
    BuiltAndPresent,
    /// The tag is not present after the build.
    Absent,
    /// Presence could not be determined.
    CheckFailed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltAndPresent => write!(f, "built_and_present"),
            Self::Absent => write!(f, "absent"),
            Self::CheckFailed => write!(f, "check_failed"),
        }
    }
}

/// Result of one build-and-inspect cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// The image tag that was built and inspected.
    pub image_tag: String,
    /// Tri-state status.
    pub status: BuildStatus,
    /// Diagnostic attached to an absent or unchecked image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Output of the build step.
    #[serde(default)]
    pub build_log: BuildLog,
}

impl BuildOutcome {
    /// Derives the outcome from a completed build and its inspection.
    #[must_use]
    pub fn from_inspection(image_tag: impl Into<String>, build_log: BuildLog, inspection: &ImageStatus) -> Self {
        let status = match inspection {
            ImageStatus::Present => BuildStatus::BuiltAndPresent,
            ImageStatus::Absent(Absence::NotFound { .. }) => BuildStatus::Absent,
            ImageStatus::Absent(Absence::CheckError { .. }) => BuildStatus::CheckFailed,
        };
        Self {
            image_tag: image_tag.into(),
            status,
            diagnostic: inspection.diagnostic().map(str::to_string),
            build_log,
        }
    }
}
