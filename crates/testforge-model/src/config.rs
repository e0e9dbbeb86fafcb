//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_auto_run_tests() -> bool {
    true
}

fn default_target_coverage() -> f64 {
    90.0
}

fn default_max_iterations() -> u32 {
    20
}

fn default_max_context_chars() -> usize {
    48_000
}

/// Configuration for one pipeline run. Read-only for the run's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Root of the codebase to generate tests for
    pub target_path: PathBuf,
    /// Explicit file subset; `None` means discover everything under
    /// `target_path`
    #[serde(default)]
    pub target_files: Option<Vec<PathBuf>>,
    /// Where test artifacts are written; defaults to `<target>/tests`
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Run the generated tests and iterate; `false` stops after generation
    #[serde(default = "default_auto_run_tests")]
    pub auto_run_tests: bool,
    /// Coverage the completion gate requires, in percent
    #[serde(default = "default_target_coverage")]
    pub target_coverage_percent: f64,
    /// Upper bound on run-tests/evaluate iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Cap on source text concatenated into a single agent request.
    /// Truncation happens at a line boundary below this limit.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl RunConfig {
    /// Configuration with defaults for the given target
    #[must_use]
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            target_files: None,
            output_dir: None,
            auto_run_tests: default_auto_run_tests(),
            target_coverage_percent: default_target_coverage(),
            max_iterations: default_max_iterations(),
            max_context_chars: default_max_context_chars(),
        }
    }

    /// With an explicit output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// With test execution enabled or disabled
    #[must_use]
    pub fn with_auto_run_tests(mut self, run: bool) -> Self {
        self.auto_run_tests = run;
        self
    }

    /// With a coverage target
    #[must_use]
    pub fn with_target_coverage(mut self, percent: f64) -> Self {
        self.target_coverage_percent = percent;
        self
    }

    /// With an iteration budget
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Directory test artifacts land in
    #[must_use]
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.target_path.join("tests"))
    }
}
