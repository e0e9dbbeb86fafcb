//! Collaborator seams
//!
//! The orchestrator consumes every external capability through one of
//! these traits: the three LLM-backed agents, scenario approval, the
//! filesystem, and the test runner. Concrete implementations are injected
//! at construction (see [`crate::pipeline::PipelineBuilder`]); there is no
//! ambient registry.
//!
//! Every call receives a [`CancellationToken`]. Implementations are
//! expected to abort promptly when it fires and surface a
//! cancellation-flavored error; the orchestrator treats that like any
//! other collaborator failure.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use testforge_extract::TestCounts;
use testforge_model::{ScenarioSet, SecurityFinding};
use tokio_util::sync::CancellationToken;

/// Raw output of one external test-runner invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    /// stdout and stderr joined, the way the metrics extractor scans them
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// One test execution plus the metrics extracted from it. This is what
/// the evaluation agent sees.
#[derive(Debug, Clone, Default)]
pub struct TestExecution {
    pub output: ExecutionOutput,
    pub counts: TestCounts,
    /// Measured coverage, 0.0 when no report was available
    pub coverage_percent: f64,
}

/// Request to the implementation agent. One call shape serves generation,
/// improvement and structural repair; the variant selects the mode.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    /// Generate a fresh test file from approved scenarios
    Fresh {
        scenarios: ScenarioSet,
        source: String,
        files: Vec<PathBuf>,
    },
    /// Improve an existing test file using coverage and security feedback
    Improve {
        existing_code: String,
        coverage_percent: f64,
        uncovered_hints: String,
        severe_findings: Vec<SecurityFinding>,
        source: String,
        files: Vec<PathBuf>,
    },
    /// Fix structurally broken generated code
    Repair { code: String, reason: String },
}

/// Agent 1: identifies test scenarios from source content.
#[async_trait]
pub trait IdentificationAgent: Send + Sync {
    async fn identify(
        &self,
        source: &str,
        files: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError>;
}

/// Agent 2: produces raw test code. The response is free text; the
/// orchestrator sanitizes and validates it.
#[async_trait]
pub trait ImplementationAgent: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError>;
}

/// Agent 3: evaluates an execution. Returns raw text expected to parse
/// into an evaluation-report-shaped JSON object.
#[async_trait]
pub trait EvaluationAgent: Send + Sync {
    async fn evaluate(
        &self,
        execution: &TestExecution,
        scenarios: &ScenarioSet,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError>;
}

/// External override/removal of identified scenarios before generation.
#[async_trait]
pub trait ScenarioApprover: Send + Sync {
    async fn approve(
        &self,
        scenarios: ScenarioSet,
        cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError>;
}

/// Default approver: identity pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprover;

#[async_trait]
impl ScenarioApprover for AutoApprover {
    async fn approve(
        &self,
        scenarios: ScenarioSet,
        _cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError> {
        Ok(scenarios)
    }
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Filesystem access. Read failures are swallowed per-file by the source
/// gatherer; write failures propagate and fail the run.
#[async_trait]
pub trait Workspace: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String, PipelineError>;
    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PipelineError>;
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, PipelineError>;
}

/// Spawns the external test process against a written artifact.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run(
        &self,
        artifact: &Path,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, PipelineError>;
}
