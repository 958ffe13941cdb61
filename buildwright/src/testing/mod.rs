//! Test doubles for buildwright.
//!
//! - Scripted container engine and inference client
//! - In-memory artifact writer with injectable failures

mod mocks;

pub use mocks::{MemoryArtifactWriter, ScriptedEngine, ScriptedInference};
