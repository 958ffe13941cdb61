//! Core domain model types for buildwright.
//!
//! This module contains the types that flow between pipeline phases:
//! - Phase identifiers and statuses
//! - The uniform `StageResult` wrapper and the `Availability` marker
//! - Generated and persisted artifacts
//! - Build outcomes, build reports, predictions and run reports

mod artifact;
mod outcome;
mod report;
mod result;
mod status;

pub use artifact::{ArtifactKind, GeneratedArtifact, PersistedArtifact};
pub use outcome::{Absence, BuildLog, BuildOutcome, BuildStatus, ImageStatus};
pub use report::{
    BuildReport, BuildReportBuilder, PhaseRecord, PredictionResult, PredictionStatus, RunReport,
};
pub use result::{Availability, StageResult};
pub use status::{Phase, PhaseStatus};
