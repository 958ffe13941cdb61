//! CI workflow definition generator.

use super::ArtifactGenerator;
use crate::config::{PipelineConfig, WorkflowSettings};
use crate::core::{ArtifactKind, GeneratedArtifact};
use std::fmt::{self, Write as _};
use std::path::PathBuf;

/// Renders the GitHub Actions workflow that runs this pipeline in CI and
/// smoke-tests the resulting container.
#[derive(Debug, Clone)]
pub struct WorkflowGenerator {
    settings: WorkflowSettings,
    image_tag: String,
    path: PathBuf,
}

impl WorkflowGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(settings: WorkflowSettings, image_tag: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            image_tag: image_tag.into(),
            path: path.into(),
        }
    }

    /// Creates a generator from the run configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.workflow.clone(),
            config.build.image_tag.clone(),
            config.output.workflow_path.clone(),
        )
    }

    /// Renders the workflow YAML.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_workflow(&mut out);
        out
    }

    fn write_workflow(&self, out: &mut String) -> fmt::Result {
        let s = &self.settings;

        writeln!(out, "name: {}\n", s.workflow_name)?;
        writeln!(
            out,
            "on:\n  push:\n    branches: [ {branch} ]\n  pull_request:\n    branches: [ {branch} ]\n",
            branch = s.branch
        )?;
        out.push_str("permissions:\n  contents: read\n  pull-requests: write\n\n");
        out.push_str("jobs:\n  build-and-verify:\n    runs-on: ubuntu-latest\n\n");
        out.push_str("    env:\n");
        writeln!(out, "      GROQ_API_ENDPOINT: ${{{{ secrets.{} }}}}", s.endpoint_secret)?;
        writeln!(out, "      GROQ_API_KEY: ${{{{ secrets.{} }}}}", s.api_key_secret)?;
        writeln!(out, "      GITHUB_TOKEN: ${{{{ secrets.{} }}}}\n", s.token_secret)?;

        out.push_str("    steps:\n");
        out.push_str("    - name: Checkout code\n      uses: actions/checkout@v4\n\n");
        writeln!(
            out,
            "    - name: Set up Python {v}\n      uses: actions/setup-python@v5\n      with:\n        python-version: {v}\n",
            v = s.runtime_version
        )?;
        out.push_str(
            "    - name: Cache pip packages\n      uses: actions/cache@v4\n      with:\n        path: ~/.cache/pip\n        key: ${{ runner.os }}-pip-${{ hashFiles('**/requirements.txt') }}\n        restore-keys: |\n          ${{ runner.os }}-pip-\n\n",
        );
        out.push_str(
            "    - name: Install dependencies\n      run: |\n        python -m pip install --upgrade pip\n        pip install -r requirements.txt\n\n",
        );
        if s.run_tests {
            out.push_str("    - name: Run tests\n      run: |\n        python -m pytest\n\n");
        }
        out.push_str("    - name: Set up Docker Buildx\n      uses: docker/setup-buildx-action@v3\n\n");
        writeln!(out, "    - name: Run build pipeline\n      run: |\n        {}\n", s.entrypoint)?;
        writeln!(
            out,
            "    - name: Start container\n      run: |\n        docker run -d -p {}:{} {}\n        sleep 5\n",
            s.host_port, s.container_port, self.image_tag
        )?;

        out.push_str("    - name: Verify container endpoints\n      run: |\n");
        writeln!(
            out,
            "        if ! docker ps | grep -q {}; then\n          echo \"Container not running\"\n          exit 1\n        fi",
            image_repository(&self.image_tag)
        )?;
        for endpoint in &s.smoke_endpoints {
            writeln!(
                out,
                "        if curl -sI {url} | grep -q \"200 OK\"; then\n          echo \"{endpoint} passed\"\n        else\n          echo \"{endpoint} failed\"\n          exit 1\n        fi",
                url = self.endpoint_url(endpoint),
            )?;
        }
        out.push_str("        echo \"All container checks passed\"\n");
        Ok(())
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        let path = endpoint.trim_start_matches('/');
        if self.settings.host_port == 80 {
            format!("http://localhost/{path}")
        } else {
            format!("http://localhost:{}/{path}", self.settings.host_port)
        }
    }
}

impl ArtifactGenerator for WorkflowGenerator {
    fn render(&self) -> GeneratedArtifact {
        GeneratedArtifact::new(
            ArtifactKind::WorkflowDefinition,
            self.settings.workflow_name.clone(),
            self.path.clone(),
            self.render_text(),
        )
    }
}

/// Returns the repository part of an image reference (`myapp:latest` → `myapp`).
///
/// A colon before the last `/` is a registry port, not a tag separator.
#[must_use]
pub(crate) fn image_repository(tag: &str) -> &str {
    let name_start = tag.rfind('/').map_or(0, |i| i + 1);
    match tag[name_start..].find(':') {
        Some(i) => &tag[..name_start + i],
        None => tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn generator(settings: WorkflowSettings) -> WorkflowGenerator {
        WorkflowGenerator::new(settings, "myapp:latest", ".github/workflows/ci.yml")
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = generator(WorkflowSettings::default()).render();
        let b = generator(WorkflowSettings::default()).render();
        assert_eq!(a.content, b.content);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.kind, ArtifactKind::WorkflowDefinition);
        assert_eq!(a.name, "CI Pipeline");
    }

    #[test]
    fn test_default_workflow_steps_in_order() {
        let text = generator(WorkflowSettings::default()).render_text();

        let steps = [
            "Checkout code",
            "Set up Python 3.13.0",
            "Cache pip packages",
            "Install dependencies",
            "Run tests",
            "Set up Docker Buildx",
            "Run build pipeline",
            "Start container",
            "Verify container endpoints",
        ];
        let positions: Vec<usize> = steps
            .iter()
            .map(|step| text.find(step).unwrap_or_else(|| panic!("missing step {step}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(text.starts_with("name: CI Pipeline\n"));
        assert!(text.contains("python-version: 3.13.0"));
        assert!(text.contains("docker run -d -p 80:80 myapp:latest"));
        assert!(text.contains("grep -q myapp;"));
        assert!(text.contains("curl -sI http://localhost/talkitdoit.html"));
        assert!(text.contains("curl -sI http://localhost/index.html"));
        assert!(text.contains("GROQ_API_KEY: ${{ secrets.GROQ_API_KEY }}"));
        assert!(text.contains("GITHUB_TOKEN: ${{ secrets.GH_TOKEN }}"));
        assert!(text.contains("python main.py"));
    }

    #[test]
    fn test_tests_step_omitted_when_disabled() {
        let settings = WorkflowSettings {
            run_tests: false,
            ..WorkflowSettings::default()
        };
        let text = generator(settings).render_text();
        assert!(!text.contains("Run tests"));
    }

    #[test]
    fn test_custom_port_and_branch() {
        let settings = WorkflowSettings {
            host_port: 8080,
            branch: "release".to_string(),
            smoke_endpoints: vec!["/health".to_string()],
            ..WorkflowSettings::default()
        };
        let text = generator(settings).render_text();
        assert!(text.contains("branches: [ release ]"));
        assert!(text.contains("-p 8080:80"));
        assert!(text.contains("http://localhost:8080/health"));
        assert!(!text.contains("index.html"));
    }

    #[test]
    fn test_image_repository() {
        assert_eq!(image_repository("myapp:latest"), "myapp");
        assert_eq!(image_repository("myapp"), "myapp");
        assert_eq!(image_repository("localhost:5000/team/app:1.2"), "localhost:5000/team/app");
        assert_eq!(image_repository("localhost:5000/app"), "localhost:5000/app");
    }
}
