//! Lifecycle events emitted by the orchestrator.
//!
//! Event types:
//! - `run.started` / `run.completed`
//! - `phase.started` / `phase.completed` / `phase.failed`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event emitted when a run begins.
pub const RUN_STARTED: &str = "run.started";
/// Event emitted when a run has produced its report.
pub const RUN_COMPLETED: &str = "run.completed";
/// Event emitted before a phase body runs.
pub const PHASE_STARTED: &str = "phase.started";
/// Event emitted when a phase succeeds.
pub const PHASE_COMPLETED: &str = "phase.completed";
/// Event emitted when a phase fails, is skipped or is cancelled.
pub const PHASE_FAILED: &str = "phase.failed";
