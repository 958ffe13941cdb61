//! Artifact generators.
//!
//! Generators are pure: the same settings always render byte-identical text.
//! Unset fields are covered by the configuration defaults, so rendering
//! cannot fail.

mod container_file;
mod workflow;

pub use container_file::ContainerFileGenerator;
pub use workflow::WorkflowGenerator;

use crate::core::GeneratedArtifact;

/// Renders one artifact from its settings.
pub trait ArtifactGenerator: Send + Sync {
    /// Renders the artifact.
    fn render(&self) -> GeneratedArtifact;
}
