//! # Buildwright
//!
//! Generates CI/CD artifacts for a small web project, builds its container
//! image and asks a language model whether the build looks healthy.
//!
//! A run has four phases, each isolated from the others:
//!
//! 1. **CI workflow**: render and persist a GitHub Actions workflow
//! 2. **Container build file**: render and persist a Dockerfile
//! 3. **Image build**: invoke the container engine, then inspect the image
//! 4. **Build prediction**: send a build report to the inference backend
//!
//! A failing phase is recorded and the run carries on; the run always ends
//! with a [`core::RunReport`]. Separately, [`review`] offers pull-request
//! code review and a chat assistant that post their answers as comments.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildwright::prelude::*;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::load(None)?;
//! let token = Arc::new(CancellationToken::new());
//! let report = Orchestrator::from_config(&config, token)?.run().await;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod generators;
pub mod observability;
pub mod persistence;
pub mod pipeline;
pub mod prediction;
pub mod review;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{GitHubClient, HttpInferenceClient, InferenceClient, SourceHosting};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        Availability, BuildOutcome, BuildReport, BuildStatus, Phase, PhaseStatus,
        PredictionResult, RunReport, StageResult,
    };
    pub use crate::errors::{AdapterError, ConfigError, ExecError, PersistenceError, PipelineError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{BuildExecutor, ContainerEngine, DockerCli};
    pub use crate::generators::{ArtifactGenerator, ContainerFileGenerator, WorkflowGenerator};
    pub use crate::persistence::{ArtifactWriter, FsArtifactWriter};
    pub use crate::pipeline::Orchestrator;
    pub use crate::prediction::BuildPredictor;
    pub use crate::review::{ChatAssistant, CodeReviewer};
}
