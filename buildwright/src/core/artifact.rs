//! Generated and persisted artifact types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Which artifact a generator produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The CI workflow definition (YAML).
    WorkflowDefinition,
    /// The container build file.
    ContainerFile,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowDefinition => write!(f, "workflow_definition"),
            Self::ContainerFile => write!(f, "container_file"),
        }
    }
}

/// A rendered text artifact and the path it is destined for.
///
/// Immutable once produced. Rendering is pure, so two artifacts rendered from
/// the same settings have the same content and digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// What kind of artifact this is.
    pub kind: ArtifactKind,
    /// A display name (e.g. the workflow name).
    pub name: String,
    /// Target path, relative to the writer's root unless absolute.
    pub path: PathBuf,
    /// The rendered UTF-8 content.
    pub content: String,
}

impl GeneratedArtifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(
        kind: ArtifactKind,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            path: path.into(),
            content: content.into(),
        }
    }

    /// Returns the hex-encoded SHA-256 digest of the content.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.content.as_bytes()))
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Where an artifact ended up after the writer persisted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArtifact {
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// The resolved path that was written.
    pub path: PathBuf,
    /// SHA-256 of the written content.
    pub digest: String,
    /// Number of bytes written.
    pub bytes: usize,
}

impl PersistedArtifact {
    /// Describes `artifact` as written to `path`.
    #[must_use]
    pub fn new(artifact: &GeneratedArtifact, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: artifact.kind,
            path: path.into(),
            digest: artifact.digest(),
            bytes: artifact.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = GeneratedArtifact::new(ArtifactKind::ContainerFile, "Dockerfile", "Dockerfile", "FROM scratch\n");
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_digest_changes_with_content() {
        let a = GeneratedArtifact::new(ArtifactKind::ContainerFile, "Dockerfile", "Dockerfile", "FROM a\n");
        let b = GeneratedArtifact::new(ArtifactKind::ContainerFile, "Dockerfile", "Dockerfile", "FROM b\n");
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_persisted_artifact_copies_digest() {
        let artifact = GeneratedArtifact::new(ArtifactKind::WorkflowDefinition, "CI", "ci.yml", "name: CI\n");
        let persisted = PersistedArtifact::new(&artifact, "/tmp/ci.yml");
        assert_eq!(persisted.digest, artifact.digest());
        assert_eq!(persisted.bytes, 9);
        assert_eq!(persisted.kind, ArtifactKind::WorkflowDefinition);
    }
}
