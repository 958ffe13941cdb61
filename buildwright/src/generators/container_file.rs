//! Container build file generator.

use super::ArtifactGenerator;
use crate::config::{ContainerFileSettings, PipelineConfig};
use crate::core::{ArtifactKind, GeneratedArtifact};
use std::path::PathBuf;

/// Renders a Dockerfile serving static content from `copy_source`.
///
/// Values are written verbatim; a malformed image name is left for the
/// container engine to reject.
#[derive(Debug, Clone)]
pub struct ContainerFileGenerator {
    settings: ContainerFileSettings,
    path: PathBuf,
}

impl ContainerFileGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(settings: ContainerFileSettings, path: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            path: path.into(),
        }
    }

    /// Creates a generator from the run configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.container_file.clone(), config.output.container_file_path.clone())
    }

    /// Renders the build file text.
    #[must_use]
    pub fn render_text(&self) -> String {
        let s = &self.settings;
        format!(
            "FROM {}\n\nWORKDIR {}\n\nCOPY {} .\n\nEXPOSE {}\n\nCMD {}\n",
            s.base_image,
            s.work_dir,
            s.copy_source,
            s.expose_port,
            exec_form(&s.command),
        )
    }
}

impl ArtifactGenerator for ContainerFileGenerator {
    fn render(&self) -> GeneratedArtifact {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "Dockerfile".to_string(), |n| n.to_string_lossy().into_owned());
        GeneratedArtifact::new(ArtifactKind::ContainerFile, name, self.path.clone(), self.render_text())
    }
}

/// Formats a command as a JSON array (`["nginx", "-g", "daemon off;"]`).
fn exec_form(command: &[String]) -> String {
    let parts: Vec<String> = command
        .iter()
        .map(|arg| serde_json::Value::String(arg.clone()).to_string())
        .collect();
    format!("[{}]", parts.join(", "))
}
