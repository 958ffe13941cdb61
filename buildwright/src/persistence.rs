//! Artifact persistence.

use crate::core::{GeneratedArtifact, PersistedArtifact};
use crate::errors::PersistenceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes generated artifacts to storage.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Persists `artifact`, replacing whatever was there.
    async fn write(&self, artifact: &GeneratedArtifact) -> Result<PersistedArtifact, PersistenceError>;
}

/// Writes artifacts as UTF-8 files beneath `root`.
///
/// Relative artifact paths are resolved against `root`; absolute paths are
/// used as-is. Parent directories are created on demand.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    root: PathBuf,
}

impl FsArtifactWriter {
    /// Creates a writer rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns where `path` is written.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl ArtifactWriter for FsArtifactWriter {
    async fn write(&self, artifact: &GeneratedArtifact) -> Result<PersistedArtifact, PersistenceError> {
        let target = self.resolve(&artifact.path);

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::new(parent, e))?;
        }
        tokio::fs::write(&target, artifact.content.as_bytes())
            .await
            .map_err(|e| PersistenceError::new(&target, e))?;

        debug!(path = %target.display(), bytes = artifact.len(), kind = %artifact.kind, "Artifact written");
        Ok(PersistedArtifact::new(artifact, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactKind;

    #[tokio::test]
    async fn test_writes_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path());
        let artifact = GeneratedArtifact::new(
            ArtifactKind::WorkflowDefinition,
            "CI",
            ".github/workflows/ci.yml",
            "name: CI\n",
        );

        let persisted = writer.write(&artifact).await.unwrap();

        let expected = dir.path().join(".github/workflows/ci.yml");
        assert_eq!(persisted.path, expected);
        assert_eq!(persisted.digest, artifact.digest());
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "name: CI\n");
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path());
        std::fs::write(dir.path().join("Dockerfile"), "FROM old\nEXTRA\n").unwrap();

        let artifact = GeneratedArtifact::new(ArtifactKind::ContainerFile, "Dockerfile", "Dockerfile", "FROM new\n");
        writer.write(&artifact).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap(),
            "FROM new\n"
        );
    }

    #[tokio::test]
    async fn test_write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        std::fs::write(dir.path().join("blocker"), "x").unwrap();
        let writer = FsArtifactWriter::new(dir.path());
        let artifact = GeneratedArtifact::new(ArtifactKind::ContainerFile, "Dockerfile", "blocker/Dockerfile", "FROM a\n");

        let err = writer.write(&artifact).await.unwrap_err();
        assert!(err.path.ends_with("blocker"));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let writer = FsArtifactWriter::new("/srv/out");
        assert_eq!(writer.resolve(Path::new("/tmp/Dockerfile")), PathBuf::from("/tmp/Dockerfile"));
        assert_eq!(writer.resolve(Path::new("Dockerfile")), PathBuf::from("/srv/out/Dockerfile"));
    }
}
