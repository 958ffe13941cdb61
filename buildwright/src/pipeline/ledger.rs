//! Per-run bookkeeping of phase outcomes.
//!
//! Every phase is recorded exactly once, ok or failed. Failures never stop
//! the run; they only block phases that hard-depend on the failed one.

use crate::core::{Phase, PhaseRecord};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Collects phase records for one run.
#[derive(Debug)]
pub struct PhaseLedger {
    run_id: Uuid,
    records: Vec<PhaseRecord>,
    failed: HashSet<Phase>,
}

impl PhaseLedger {
    /// Creates an empty ledger for `run_id`.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Vec::with_capacity(Phase::ALL.len()),
            failed: HashSet::new(),
        }
    }

    /// The run this ledger belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records a successful phase.
    pub fn record_completion(&mut self, phase: Phase, started_at: DateTime<Utc>, duration_ms: f64) {
        self.records.push(PhaseRecord::ok(phase, started_at, duration_ms));
    }

    /// Records a failed phase.
    pub fn record_failure(
        &mut self,
        phase: Phase,
        reason: impl Into<String>,
        error_kind: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: f64,
    ) {
        self.failed.insert(phase);
        self.records
            .push(PhaseRecord::failed(phase, reason, error_kind, started_at, duration_ms));
    }

    /// Returns true if `phase` has been recorded as failed.
    #[must_use]
    pub fn has_failed(&self, phase: Phase) -> bool {
        self.failed.contains(&phase)
    }

    /// Returns the first hard dependency of `phase` that failed.
    #[must_use]
    pub fn blocking_dependency(&self, phase: Phase) -> Option<Phase> {
        phase
            .hard_dependencies()
            .iter()
            .copied()
            .find(|dep| self.has_failed(*dep))
    }

    /// Number of failed phases so far.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Consumes the ledger, returning the records in execution order.
    #[must_use]
    pub fn into_records(self) -> Vec<PhaseRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PhaseStatus;

    #[test]
    fn test_records_in_order() {
        let mut ledger = PhaseLedger::new(Uuid::new_v4());
        let now = Utc::now();
        ledger.record_completion(Phase::CiWorkflow, now, 1.0);
        ledger.record_failure(Phase::ContainerFile, "disk full", "persistence", now, 2.0);

        assert!(ledger.has_failed(Phase::ContainerFile));
        assert!(!ledger.has_failed(Phase::CiWorkflow));
        assert_eq!(ledger.failure_count(), 1);

        let records = ledger.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, PhaseStatus::Ok);
        assert_eq!(records[1].reason.as_deref(), Some("disk full"));
        assert_eq!(records[1].error_kind.as_deref(), Some("persistence"));
    }

    #[test]
    fn test_build_blocked_by_failed_container_file() {
        let mut ledger = PhaseLedger::new(Uuid::new_v4());
        assert_eq!(ledger.blocking_dependency(Phase::BuildImage), None);

        ledger.record_failure(Phase::ContainerFile, "x", "persistence", Utc::now(), 0.0);
        assert_eq!(ledger.blocking_dependency(Phase::BuildImage), Some(Phase::ContainerFile));
    }

    #[test]
    fn test_prediction_never_blocked() {
        let mut ledger = PhaseLedger::new(Uuid::new_v4());
        let now = Utc::now();
        ledger.record_failure(Phase::CiWorkflow, "x", "persistence", now, 0.0);
        ledger.record_failure(Phase::ContainerFile, "x", "persistence", now, 0.0);
        ledger.record_failure(Phase::BuildImage, "x", "skipped", now, 0.0);
        assert_eq!(ledger.blocking_dependency(Phase::Predict), None);
    }
}
