//! The four-phase run orchestrator.

use super::ledger::PhaseLedger;
use crate::adapters::{HttpInferenceClient, InferenceClient};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    Availability, BuildOutcome, BuildReport, BuildReportBuilder, PersistedArtifact, Phase, PredictionResult,
    RunReport, StageResult,
};
use crate::errors::PipelineError;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::executor::{BuildExecutor, ContainerEngine, DockerCli};
use crate::generators::{ArtifactGenerator, ContainerFileGenerator, WorkflowGenerator};
use crate::persistence::{ArtifactWriter, FsArtifactWriter};
use crate::prediction::BuildPredictor;
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs the pipeline: CI workflow, container build file, image build,
/// prediction.
///
/// Each phase is isolated: its errors and panics become a failed
/// [`crate::core::PhaseRecord`] and the run carries on. The only ordering
/// constraint is that the image is never built after the build file failed
/// to persist, and the build always reads the file persisted by this run.
pub struct Orchestrator {
    workflow: WorkflowGenerator,
    container_file: ContainerFileGenerator,
    writer: Arc<dyn ArtifactWriter>,
    executor: BuildExecutor,
    predictor: BuildPredictor,
    runtime_version: String,
    token: Arc<CancellationToken>,
    event_sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Creates an orchestrator over explicit collaborators.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        writer: Arc<dyn ArtifactWriter>,
        engine: Arc<dyn ContainerEngine>,
        inference: Arc<dyn InferenceClient>,
        token: Arc<CancellationToken>,
    ) -> Self {
        Self {
            workflow: WorkflowGenerator::from_config(config),
            container_file: ContainerFileGenerator::from_config(config),
            writer,
            executor: BuildExecutor::new(engine, config.build.clone()),
            predictor: BuildPredictor::new(inference, config.prediction.clone()),
            runtime_version: config.workflow.runtime_version.clone(),
            token,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Creates an orchestrator writing to disk, driving the configured engine
    /// CLI and calling the HTTP inference backend.
    ///
    /// # Errors
    ///
    /// Returns an adapter error if the HTTP client cannot be built.
    pub fn from_config(config: &PipelineConfig, token: Arc<CancellationToken>) -> Result<Self, PipelineError> {
        let inference = HttpInferenceClient::new(config.inference.clone(), Arc::clone(&token))?;
        let engine = DockerCli::new(
            config.build.engine.clone(),
            config.build.timeout(),
            Arc::clone(&token),
        );
        let writer = FsArtifactWriter::new(config.output.root.clone());
        Ok(Self::new(
            config,
            Arc::new(writer),
            Arc::new(engine),
            Arc::new(inference),
            token,
        ))
    }

    /// Routes lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Executes one run. Always returns a report with four phase records.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> RunReport {
        let started_at = Utc::now();
        let image_tag = self.executor.settings().image_tag.clone();
        let mut ledger = PhaseLedger::new(run_id);
        let mut artifacts = Vec::new();

        info!(image_tag = %image_tag, "Run started");
        self.event_sink.try_emit(
            events::RUN_STARTED,
            Some(json!({ "run_id": run_id.to_string(), "image_tag": image_tag })),
        );

        let workflow = self
            .execute(&mut ledger, Phase::CiWorkflow, self.persist(&self.workflow))
            .await;
        let container_file = self
            .execute(&mut ledger, Phase::ContainerFile, self.persist(&self.container_file))
            .await;
        let ci_pipeline_exists = workflow.is_ok();
        let dockerfile_exists = container_file.is_ok();
        // The build reads the file this run wrote, wherever it was resolved to.
        // When that write failed the ledger skips the build phase entirely.
        let build_file: PathBuf = container_file
            .as_ref()
            .ok()
            .map(|artifact| artifact.path.clone())
            .unwrap_or_default();
        artifacts.extend(workflow.ok());
        artifacts.extend(container_file.ok());

        let build = self
            .execute(&mut ledger, Phase::BuildImage, async {
                self.executor
                    .build_and_inspect(&image_tag, &build_file)
                    .await
                    .map_err(PipelineError::from)
            })
            .await;
        let build_outcome = build.into_availability();

        let mut prediction = None;
        let report = BuildReport::builder()
            .dockerfile_exists(dockerfile_exists)
            .ci_pipeline_exists(ci_pipeline_exists)
            .build_outcome(build_outcome.clone())
            .image_tag(image_tag.clone())
            .runtime_version(self.runtime_version.clone());
        self.execute(&mut ledger, Phase::Predict, self.predict(report, &mut prediction))
            .await;

        self.finish(run_id, started_at, ledger, artifacts, build_outcome, prediction)
    }

    fn finish(
        &self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        ledger: PhaseLedger,
        artifacts: Vec<PersistedArtifact>,
        build_outcome: Availability<BuildOutcome>,
        prediction: Option<PredictionResult>,
    ) -> RunReport {
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            phases: ledger.into_records(),
            artifacts,
            build_outcome,
            prediction,
        };

        let failed: Vec<&str> = report.failed_phases().iter().map(|p| p.as_str()).collect();
        if failed.is_empty() {
            info!(duration_ms = report.duration_ms(), "Run completed");
        } else {
            warn!(duration_ms = report.duration_ms(), failed = ?failed, "Run completed with failures");
        }
        self.event_sink.try_emit(
            events::RUN_COMPLETED,
            Some(json!({
                "run_id": run_id.to_string(),
                "failed_phases": failed,
                "last_build_status": match &report.build_outcome {
                    Availability::Available(outcome) => outcome.status.to_string(),
                    Availability::Unavailable { .. } => "unavailable".to_string(),
                },
            })),
        );
        report
    }

    /// Asks for a prediction. The result lands in `slot` even when it is an
    /// error, so the caller still sees what the backend said.
    async fn predict(
        &self,
        report: BuildReportBuilder,
        slot: &mut Option<PredictionResult>,
    ) -> Result<(), PipelineError> {
        let report = report.build()?;
        let result = self.predictor.predict(&report).await;
        let failure = result.error.clone().filter(|_| !result.is_success());
        *slot = Some(result);
        match failure {
            Some(message) => Err(PipelineError::Prediction(message)),
            None => Ok(()),
        }
    }

    /// Renders and persists one artifact.
    async fn persist(&self, generator: &dyn ArtifactGenerator) -> Result<PersistedArtifact, PipelineError> {
        let artifact = generator.render();
        info!(
            kind = %artifact.kind,
            path = %artifact.path.display(),
            digest = %artifact.digest(),
            "Artifact rendered"
        );
        Ok(self.writer.write(&artifact).await?)
    }

    /// Runs one phase body under the isolation boundary.
    ///
    /// The body is not polled at all when the run is cancelled or a hard
    /// dependency failed.
    async fn execute<T, F>(&self, ledger: &mut PhaseLedger, phase: Phase, stage: F) -> StageResult<T>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = ledger.run_id().to_string();

        let refusal = if self.token.is_cancelled() {
            let reason = self.token.reason().unwrap_or_else(|| "cancelled".to_string());
            Some((format!("cancelled: {reason}"), "cancelled"))
        } else {
            ledger
                .blocking_dependency(phase)
                .map(|dep| (format!("skipped: upstream phase '{dep}' failed"), "skipped"))
        };
        if let Some((reason, kind)) = refusal {
            warn!(phase = %phase, reason = %reason, "Phase not run");
            ledger.record_failure(phase, reason.clone(), kind, started_at, 0.0);
            self.event_sink.try_emit(
                events::PHASE_FAILED,
                Some(json!({ "run_id": run_id, "phase": phase.as_str(), "reason": reason, "kind": kind })),
            );
            return StageResult::Failed(reason);
        }

        self.event_sink.try_emit(
            events::PHASE_STARTED,
            Some(json!({ "run_id": run_id, "phase": phase.as_str(), "ordinal": phase.ordinal() })),
        );

        let span = info_span!("phase", phase = %phase);
        let outcome = AssertUnwindSafe(stage).catch_unwind().instrument(span).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let error = match outcome {
            Ok(Ok(value)) => {
                info!(phase = %phase, duration_ms, "Phase completed");
                ledger.record_completion(phase, started_at, duration_ms);
                self.event_sink.try_emit(
                    events::PHASE_COMPLETED,
                    Some(json!({ "run_id": run_id, "phase": phase.as_str(), "duration_ms": duration_ms })),
                );
                return StageResult::Ok(value);
            }
            Ok(Err(err)) => err,
            Err(payload) => PipelineError::Panicked(panic_message(payload.as_ref())),
        };

        let reason = error.to_string();
        error!(phase = %phase, kind = error.kind(), error = %reason, duration_ms, "Phase failed");
        ledger.record_failure(phase, reason.clone(), error.kind(), started_at, duration_ms);
        self.event_sink.try_emit(
            events::PHASE_FAILED,
            Some(json!({
                "run_id": run_id,
                "phase": phase.as_str(),
                "reason": reason,
                "kind": error.kind(),
                "duration_ms": duration_ms,
            })),
        );
        StageResult::Failed(reason)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
