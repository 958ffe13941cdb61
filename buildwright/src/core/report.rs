//! Build reports, prediction results and the per-run report.

use super::{Availability, BuildOutcome, PersistedArtifact, Phase, PhaseStatus};
use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The snapshot handed to the prediction stage.
///
/// Every field is populated; a failed build is represented by
/// `Availability::Unavailable`, never by an omitted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Whether the container build file was persisted in this run.
    pub dockerfile_exists: bool,
    /// Whether the CI workflow was persisted in this run.
    pub ci_pipeline_exists: bool,
    /// The build-and-inspect outcome, or why it is missing.
    pub build_outcome: Availability<BuildOutcome>,
    /// The image tag targeted by the run.
    pub image_tag: String,
    /// Runtime version configured for the CI workflow.
    pub runtime_version: String,
}

impl BuildReport {
    /// Starts a builder that refuses to produce a partial report.
    #[must_use]
    pub fn builder() -> BuildReportBuilder {
        BuildReportBuilder::default()
    }

    /// Returns the last build status label: `built_and_present`, `absent`,
    /// `check_failed` or `unavailable`.
    #[must_use]
    pub fn last_build_status(&self) -> String {
        match &self.build_outcome {
            Availability::Available(outcome) => outcome.status.to_string(),
            Availability::Unavailable { .. } => "unavailable".to_string(),
        }
    }

    /// Returns the flat JSON summary embedded in the prediction prompt.
    ///
    /// The runtime version goes out under `python_version`, the key the
    /// prediction prompt has always used.
    #[must_use]
    pub fn to_summary(&self) -> serde_json::Value {
        let diagnostic = match &self.build_outcome {
            Availability::Available(outcome) => outcome.diagnostic.clone(),
            Availability::Unavailable { reason } => Some(reason.clone()),
        };
        serde_json::json!({
            "dockerfile_exists": self.dockerfile_exists,
            "ci_pipeline_exists": self.ci_pipeline_exists,
            "last_build_status": self.last_build_status(),
            "build_diagnostic": diagnostic,
            "image_tag": self.image_tag,
            "python_version": self.runtime_version,
        })
    }
}

/// Builder for [`BuildReport`].
#[derive(Debug, Default)]
pub struct BuildReportBuilder {
    dockerfile_exists: Option<bool>,
    ci_pipeline_exists: Option<bool>,
    build_outcome: Option<Availability<BuildOutcome>>,
    image_tag: Option<String>,
    runtime_version: Option<String>,
}

impl BuildReportBuilder {
    /// Sets whether the build file exists.
    #[must_use]
    pub fn dockerfile_exists(mut self, exists: bool) -> Self {
        self.dockerfile_exists = Some(exists);
        self
    }

    /// Sets whether the CI workflow exists.
    #[must_use]
    pub fn ci_pipeline_exists(mut self, exists: bool) -> Self {
        self.ci_pipeline_exists = Some(exists);
        self
    }

    /// Sets the build outcome marker.
    #[must_use]
    pub fn build_outcome(mut self, outcome: Availability<BuildOutcome>) -> Self {
        self.build_outcome = Some(outcome);
        self
    }

    /// Sets the image tag.
    #[must_use]
    pub fn image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = Some(tag.into());
        self
    }

    /// Sets the runtime version.
    #[must_use]
    pub fn runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    /// Builds the report.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IncompleteReport` naming the first unset field.
    pub fn build(self) -> Result<BuildReport, PipelineError> {
        Ok(BuildReport {
            dockerfile_exists: self
                .dockerfile_exists
                .ok_or(PipelineError::IncompleteReport("dockerfile_exists"))?,
            ci_pipeline_exists: self
                .ci_pipeline_exists
                .ok_or(PipelineError::IncompleteReport("ci_pipeline_exists"))?,
            build_outcome: self
                .build_outcome
                .ok_or(PipelineError::IncompleteReport("build_outcome"))?,
            image_tag: self
                .image_tag
                .ok_or(PipelineError::IncompleteReport("image_tag"))?,
            runtime_version: self
                .runtime_version
                .ok_or(PipelineError::IncompleteReport("runtime_version"))?,
        })
    }
}

/// Status of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    /// The backend returned a prediction.
    Success,
    /// The backend could not be asked or did not answer usefully.
    Error,
}

/// The advisory prediction surfaced to the caller of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Success or error.
    pub status: PredictionStatus,
    /// The generated text (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// The error message (error only, never empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The model that was asked.
    pub model: String,
}

impl PredictionResult {
    /// Creates a successful prediction.
    #[must_use]
    pub fn success(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            status: PredictionStatus::Success,
            content: Some(content.into()),
            error: None,
            model: model.into(),
        }
    }

    /// Creates an error result. An empty message is replaced so callers can
    /// always show something.
    #[must_use]
    pub fn error(model: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "unknown inference error".to_string()
        } else {
            message
        };
        Self {
            status: PredictionStatus::Error,
            content: None,
            error: Some(message),
            model: model.into(),
        }
    }

    /// Returns true for a successful prediction.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PredictionStatus::Success
    }
}

/// What happened to one phase of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// The phase.
    pub phase: Phase,
    /// Ok or failed.
    pub status: PhaseStatus,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Failure category (see `PipelineError::kind`, plus `skipped` and `cancelled`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// When the phase started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl PhaseRecord {
    /// Records a successful phase.
    #[must_use]
    pub fn ok(phase: Phase, started_at: DateTime<Utc>, duration_ms: f64) -> Self {
        Self {
            phase,
            status: PhaseStatus::Ok,
            reason: None,
            error_kind: None,
            started_at,
            duration_ms,
        }
    }

    /// Records a failed phase.
    #[must_use]
    pub fn failed(
        phase: Phase,
        reason: impl Into<String>,
        error_kind: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: f64,
    ) -> Self {
        Self {
            phase,
            status: PhaseStatus::Failed,
            reason: Some(reason.into()),
            error_kind: Some(error_kind.into()),
            started_at,
            duration_ms,
        }
    }

    /// Returns true if the phase succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == PhaseStatus::Ok
    }

    /// Renders the human-readable status line printed for the phase.
    #[must_use]
    pub fn status_line(&self) -> String {
        let marker = match self.phase.ordinal() {
            1 => "1️⃣",
            2 => "2️⃣",
            3 => "3️⃣",
            _ => "4️⃣",
        };
        match &self.reason {
            None => format!(
                "{marker} {}: ✅ ok ({:.0} ms)",
                self.phase.title(),
                self.duration_ms
            ),
            Some(reason) => format!("{marker} {}: ❌ failed: {reason}", self.phase.title()),
        }
    }
}

/// The aggregated record of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Exactly one record per phase, in execution order.
    pub phases: Vec<PhaseRecord>,
    /// Artifacts persisted during the run.
    #[serde(default)]
    pub artifacts: Vec<PersistedArtifact>,
    /// The build outcome handed to the prediction.
    pub build_outcome: Availability<BuildOutcome>,
    /// The prediction, when the prediction phase got far enough to ask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
}

impl RunReport {
    /// Returns the record for `phase`.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|record| record.phase == phase)
    }

    /// Returns the status recorded for `phase`.
    #[must_use]
    pub fn status_of(&self, phase: Phase) -> Option<PhaseStatus> {
        self.phase(phase).map(|record| record.status)
    }

    /// Returns the phases that failed.
    #[must_use]
    pub fn failed_phases(&self) -> Vec<Phase> {
        self.phases
            .iter()
            .filter(|record| !record.is_ok())
            .map(|record| record.phase)
            .collect()
    }

    /// Returns true if every phase succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.phases.iter().all(PhaseRecord::is_ok)
    }

    /// Returns the run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64
    }

    /// Returns one status line per phase.
    #[must_use]
    pub fn status_lines(&self) -> Vec<String> {
        self.phases.iter().map(PhaseRecord::status_line).collect()
    }

    /// Returns a one-line summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let failed = self.failed_phases();
        if failed.is_empty() {
            format!("✨ Run {} completed: all {} phases ok", self.run_id, self.phases.len())
        } else {
            let names: Vec<&str> = failed.iter().map(|phase| phase.as_str()).collect();
            format!(
                "⚠️ Run {} completed with {} failed phase(s): {}",
                self.run_id,
                failed.len(),
                names.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildLog, BuildStatus};

    fn absent_outcome() -> BuildOutcome {
        BuildOutcome {
            image_tag: "myapp:latest".to_string(),
            status: BuildStatus::Absent,
            diagnostic: Some("No such object".to_string()),
            build_log: BuildLog::default(),
        }
    }

    #[test]
    fn test_builder_rejects_partial_report() {
        let err = BuildReport::builder()
            .dockerfile_exists(true)
            .ci_pipeline_exists(true)
            .image_tag("myapp:latest")
            .runtime_version("3.13.0")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::IncompleteReport("build_outcome")));
    }

    #[test]
    fn test_summary_with_absent_image() {
        let report = BuildReport::builder()
            .dockerfile_exists(true)
            .ci_pipeline_exists(true)
            .build_outcome(Availability::Available(absent_outcome()))
            .image_tag("myapp:latest")
            .runtime_version("3.13.0")
            .build()
            .unwrap();

        let summary = report.to_summary();
        assert_eq!(summary["dockerfile_exists"], true);
        assert_eq!(summary["last_build_status"], "absent");
        assert_eq!(summary["build_diagnostic"], "No such object");
        assert_eq!(summary["python_version"], "3.13.0");
        assert!(summary.get("runtime_version").is_none());
    }

    #[test]
    fn test_summary_with_unavailable_outcome() {
        let report = BuildReport::builder()
            .dockerfile_exists(false)
            .ci_pipeline_exists(true)
            .build_outcome(Availability::Unavailable {
                reason: "build exited with code 1".to_string(),
            })
            .image_tag("myapp:latest")
            .runtime_version("3.13.0")
            .build()
            .unwrap();

        assert_eq!(report.last_build_status(), "unavailable");
        let summary = report.to_summary();
        assert_eq!(summary["last_build_status"], "unavailable");
        assert_eq!(summary["build_diagnostic"], "build exited with code 1");
    }

    #[test]
    fn test_prediction_error_never_empty() {
        let result = PredictionResult::error("llama3-8b-8192", "  ");
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("unknown inference error"));
        assert!(result.content.is_none());
    }

    #[test]
    fn test_status_lines() {
        let now = Utc::now();
        let ok = PhaseRecord::ok(Phase::CiWorkflow, now, 3.0);
        let failed = PhaseRecord::failed(Phase::BuildImage, "engine missing", "external_process", now, 1.0);

        assert!(ok.status_line().contains("✅ ok"));
        assert!(failed.status_line().contains("❌ failed: engine missing"));
        assert!(failed.status_line().starts_with("3️⃣"));
    }

    #[test]
    fn test_run_report_queries() {
        let now = Utc::now();
        let report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            phases: vec![
                PhaseRecord::ok(Phase::CiWorkflow, now, 1.0),
                PhaseRecord::ok(Phase::ContainerFile, now, 1.0),
                PhaseRecord::failed(Phase::BuildImage, "boom", "external_process", now, 1.0),
                PhaseRecord::ok(Phase::Predict, now, 1.0),
            ],
            artifacts: Vec::new(),
            build_outcome: Availability::Unavailable {
                reason: "boom".to_string(),
            },
            prediction: None,
        };

        assert!(!report.is_success());
        assert_eq!(report.failed_phases(), vec![Phase::BuildImage]);
        assert_eq!(report.status_of(Phase::Predict), Some(PhaseStatus::Ok));
        assert!(report.summary().contains("build_image"));
        assert_eq!(report.status_lines().len(), 4);
    }
}
