//! External pytest invocation
//!
//! Runs the generated test file under pytest with coverage measurement.
//! The process executes from the project root (the artifact's parent's
//! parent) so `coverage.json` lands where the metrics extractor looks for
//! it. Spawn failures are collaborator errors; a non-zero pytest exit is
//! an ordinary result the metrics layer interprets.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use testforge_core::{ExecutionOutput, PipelineError, TestRunner};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Coverage config written next to the sources so generated test files are
/// excluded from their own coverage measurement.
const COVERAGERC: &str = "\
[run]
omit =
    */tests/*
    **/test_*.py
    **/*_test.py
    **/conftest.py

[report]
omit =
    */tests/*
    **/test_*.py
    **/*_test.py
    **/conftest.py
";

/// [`TestRunner`] that shells out to `python -m pytest` with pytest-cov.
#[derive(Debug, Clone)]
pub struct PytestRunner {
    python: String,
}

impl PytestRunner {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl Default for PytestRunner {
    fn default() -> Self {
        Self::new("python3")
    }
}

#[async_trait]
impl TestRunner for PytestRunner {
    async fn run(
        &self,
        artifact: &Path,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, PipelineError> {
        if let Err(e) = tokio::fs::write(workdir.join(".coveragerc"), COVERAGERC).await {
            tracing::warn!(error = %e, "could not write .coveragerc");
        }

        let cov_target = format!("--cov={}", workdir.display());
        let mut command = Command::new(&self.python);
        command
            .args(["-m", "pytest"])
            .arg(artifact)
            .args([
                "-v",
                "--tb=short",
                &cov_target,
                "--cov-branch",
                "--cov-report=term-missing",
                "--cov-report=json",
            ])
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(artifact = %artifact.display(), "spawning pytest");
        let child = command
            .spawn()
            .map_err(|e| PipelineError::collaborator(format!("failed to spawn pytest: {e}")))?;

        let output = tokio::select! {
            result = child.wait_with_output() => result
                .map_err(|e| PipelineError::collaborator(format!("pytest did not complete: {e}")))?,
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        };

        Ok(ExecutionOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
