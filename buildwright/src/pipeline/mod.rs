//! Run orchestration.
//!
//! This module provides:
//! - [`Orchestrator`], which sequences the four phases of a run
//! - [`PhaseLedger`], the continue-on-failure bookkeeping behind it

mod ledger;
mod orchestrator;


pub use ledger::PhaseLedger;
pub use orchestrator::Orchestrator;
