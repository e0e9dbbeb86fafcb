//! Pipeline orchestrator
//!
//! Drives one [`PipelineRun`] from creation to a terminal state,
//! sequentially: identification, approval, generation, then a bounded
//! run-tests/evaluate/improve loop gated on coverage and security. The
//! orchestrator is the sole writer of the run for its whole lifetime; one
//! collaborator call is in flight at a time.
//!
//! Collaborators are injected through [`PipelineBuilder`] - explicit
//! composition at startup, no global registries.

use crate::error::{BuildError, PipelineError};
use crate::gate::completion_met;
use crate::repair::repair_code;
use crate::sources::{gather_sources, SourceSet};
use crate::traits::{
    AutoApprover, EvaluationAgent, ExecutionOutput, GenerationRequest, IdentificationAgent,
    ImplementationAgent, ScenarioApprover, TestExecution, TestRunner, Workspace,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use testforge_extract::{
    extract_code, extract_json, extract_uncovered_areas, parse_coverage, parse_test_counts,
};
use testforge_model::{
    EvaluationReport, ExecutionSummary, PipelineRun, RunConfig, RunStatus, ScenarioSet,
    SecurityFinding,
};
use tokio_util::sync::CancellationToken;

/// Wall-clock budget for one external test-runner invocation. Expiry is a
/// zero-result execution, not a run failure.
pub const RUNNER_TIMEOUT: Duration = Duration::from_secs(300);

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// The orchestration engine. Cheap to clone via its `Arc`'d collaborators;
/// independent runs share no mutable state.
#[derive(Clone)]
pub struct Pipeline {
    identifier: Arc<dyn IdentificationAgent>,
    implementer: Arc<dyn ImplementationAgent>,
    evaluator: Arc<dyn EvaluationAgent>,
    approver: Arc<dyn ScenarioApprover>,
    workspace: Arc<dyn Workspace>,
    runner: Arc<dyn TestRunner>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Start assembling a pipeline
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Execute a full pipeline run.
    ///
    /// Never returns `Err`: collaborator failures are captured into the
    /// run's terminal `Failed` state with the message verbatim.
    pub async fn run(&self, config: &RunConfig, cancel: &CancellationToken) -> PipelineRun {
        let mut run = PipelineRun::new();
        tracing::info!(
            run_id = %run.id,
            target = %config.target_path.display(),
            "starting pipeline run"
        );
        match self.drive(&mut run, config, cancel).await {
            Ok(()) => {
                tracing::info!(
                    run_id = %run.id,
                    status = %run.status,
                    iterations = run.iteration,
                    "pipeline run finished"
                );
            }
            Err(e) => {
                tracing::error!(run_id = %run.id, error = %e, "pipeline run failed");
                run.fail(e.to_string());
            }
        }
        run
    }

    /// Agent step 1, for layers that drive the loop step-by-step:
    /// gather sources and identify scenarios.
    pub async fn identify(
        &self,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError> {
        let sources = self.gather(config).await?;
        self.identify_with(&sources, cancel).await
    }

    /// Agent step 2: generate, sanitize, repair and persist a fresh test
    /// artifact for already-approved scenarios.
    pub async fn implement(
        &self,
        scenarios: &ScenarioSet,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<(String, PathBuf), PipelineError> {
        let sources = self.gather(config).await?;
        self.implement_with(&sources, scenarios, config, cancel).await
    }

    /// Agent step 3: evaluate one test execution into a structured report
    /// with the severe flag recomputed locally.
    pub async fn evaluate(
        &self,
        execution: &TestExecution,
        scenarios: &ScenarioSet,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport, PipelineError> {
        let sources = self.gather(config).await?;
        self.evaluate_with(&sources, execution, scenarios, cancel).await
    }

    async fn gather(&self, config: &RunConfig) -> Result<SourceSet, PipelineError> {
        let sources = gather_sources(self.workspace.as_ref(), config).await?;
        if sources.is_empty() {
            return Err(PipelineError::NoSourceFound);
        }
        Ok(sources)
    }

    async fn identify_with(
        &self,
        sources: &SourceSet,
        cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError> {
        let scenarios = self
            .identifier
            .identify(&sources.content, &sources.files, cancel)
            .await?
            .dedup();
        if scenarios.is_empty() {
            return Err(PipelineError::NoSourceFound);
        }
        tracing::info!(scenarios = scenarios.len(), "identified test scenarios");
        Ok(scenarios)
    }

    async fn implement_with(
        &self,
        sources: &SourceSet,
        scenarios: &ScenarioSet,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<(String, PathBuf), PipelineError> {
        let raw = self
            .implementer
            .generate(
                GenerationRequest::Fresh {
                    scenarios: scenarios.clone(),
                    source: sources.content.clone(),
                    files: sources.files.clone(),
                },
                cancel,
            )
            .await?;
        let code = repair_code(self.implementer.as_ref(), extract_code(&raw), cancel).await?;

        let dir = config.resolved_output_dir();
        let artifact = dir.join(format!("test_generated_{}.py", chrono::Utc::now().timestamp()));
        self.workspace.write_file(&artifact, &code).await?;
        tracing::info!(artifact = %artifact.display(), "generated test artifact");
        Ok((code, artifact))
    }

    async fn evaluate_with(
        &self,
        sources: &SourceSet,
        execution: &TestExecution,
        scenarios: &ScenarioSet,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport, PipelineError> {
        let raw = self
            .evaluator
            .evaluate(execution, scenarios, &sources.content, cancel)
            .await?;
        parse_evaluation(&raw, execution)
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        ensure_live(cancel)?;

        // Identification
        let sources = self.gather(config).await?;
        tracing::info!(files = sources.files.len(), "gathered source files");
        run.scenarios = self.identify_with(&sources, cancel).await?;
        run.transition(RunStatus::AwaitingApproval)?;

        // Approval (default: identity pass-through)
        run.approved_scenarios = self.approver.approve(run.scenarios.clone(), cancel).await?;
        tracing::info!(approved = run.approved_scenarios.len(), "scenarios approved");
        run.transition(RunStatus::GeneratingTests)?;

        // Generation
        ensure_live(cancel)?;
        let (code, artifact) = self
            .implement_with(&sources, &run.approved_scenarios, config, cancel)
            .await?;
        run.generated_code = code;
        run.artifact_path = Some(artifact.clone());

        if !config.auto_run_tests {
            run.transition(RunStatus::Completed)?;
            return Ok(());
        }

        // Feedback loop, bounded by the iteration budget.
        let workdir = config.target_path.clone();
        let mut best: Option<(f64, String)> = None;
        let mut last_coverage = 0.0_f64;

        while run.iteration < config.max_iterations {
            ensure_live(cancel)?;
            run.transition(RunStatus::RunningTests)?;
            run.iteration += 1;
            tracing::info!(iteration = run.iteration, "running generated tests");

            let output = self.execute_tests(&artifact, &workdir, cancel).await?;
            let combined = output.combined();
            let counts = parse_test_counts(&combined);
            let coverage = read_coverage(&artifact).await;
            tracing::info!(
                passed = counts.passed,
                failed = counts.failed,
                coverage,
                "test execution measured"
            );

            run.transition(RunStatus::EvaluatingResults)?;
            let execution = TestExecution {
                output,
                counts,
                coverage_percent: coverage,
            };
            let report = self
                .evaluate_with(&sources, &execution, &run.approved_scenarios, cancel)
                .await?;
            last_coverage = report.coverage_percent;

            if best
                .as_ref()
                .map_or(true, |(c, _)| report.coverage_percent > *c)
            {
                best = Some((report.coverage_percent, run.generated_code.clone()));
            }

            let met = completion_met(&report, config.target_coverage_percent);
            let severe: Vec<SecurityFinding> = report.severe_findings().cloned().collect();
            run.evaluation = Some(report);

            if met {
                tracing::info!(iteration = run.iteration, "completion gate satisfied");
                run.transition(RunStatus::Completed)?;
                return Ok(());
            }

            run.transition(RunStatus::ImprovingCoverage)?;
            if run.iteration >= config.max_iterations {
                break;
            }

            let hints = extract_uncovered_areas(&combined);
            tracing::info!(
                coverage = last_coverage,
                severe = severe.len(),
                "gate not met, generating improved tests"
            );
            let raw = self
                .implementer
                .generate(
                    GenerationRequest::Improve {
                        existing_code: run.generated_code.clone(),
                        coverage_percent: last_coverage,
                        uncovered_hints: hints,
                        severe_findings: severe,
                        source: sources.content.clone(),
                        files: sources.files.clone(),
                    },
                    cancel,
                )
                .await?;
            let code = repair_code(self.implementer.as_ref(), extract_code(&raw), cancel).await?;
            self.workspace.write_file(&artifact, &code).await?;
            run.generated_code = code;
        }

        // Budget exhausted. Restore the highest-coverage snapshot when the
        // final iteration regressed.
        if let Some((best_coverage, best_code)) = best {
            if best_coverage > last_coverage {
                tracing::info!(best_coverage, "restoring highest-coverage test code");
                self.workspace.write_file(&artifact, &best_code).await?;
                run.generated_code = best_code;
            }
        }
        tracing::warn!(
            max_iterations = config.max_iterations,
            "iteration budget exhausted without meeting the gate"
        );
        run.transition(RunStatus::Completed)?;
        Ok(())
    }

    /// Invoke the external runner under the wall-clock timeout. Expiry
    /// degrades to a zero-count execution; runner spawn errors propagate.
    async fn execute_tests(
        &self,
        artifact: &Path,
        workdir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, PipelineError> {
        match tokio::time::timeout(RUNNER_TIMEOUT, self.runner.run(artifact, workdir, cancel)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = RUNNER_TIMEOUT.as_secs(),
                    "test runner timed out, treating as zero-result execution"
                );
                Ok(ExecutionOutput {
                    exit_code: 1,
                    stdout: "Test execution timed out".to_string(),
                    stderr: String::new(),
                })
            }
        }
    }
}

/// Read the coverage report off the executor thread. A missing report is
/// already 0.0 inside `parse_coverage`; a failed blocking task degrades
/// the same way.
async fn read_coverage(artifact: &Path) -> f64 {
    let artifact = artifact.to_path_buf();
    match tokio::task::spawn_blocking(move || parse_coverage(&artifact)).await {
        Ok(percent) => percent,
        Err(e) => {
            tracing::warn!(error = %e, "coverage read task failed, treating as 0%");
            0.0
        }
    }
}

/// Parse the evaluation agent's raw response into a report, overriding the
/// self-reported numbers with measured values and recomputing the severe
/// flag from the findings list.
fn parse_evaluation(
    raw: &str,
    execution: &TestExecution,
) -> Result<EvaluationReport, PipelineError> {
    let value = extract_json(raw, "execution_summary")?;

    let recommendations = value
        .get("actionable_recommendations")
        .or_else(|| value.get("recommendations"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let findings = value
        .get("security_issues")
        .or_else(|| value.get("findings"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(
                    |item| match serde_json::from_value::<SecurityFinding>(item.clone()) {
                        Ok(finding) => Some(finding),
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping unparseable security finding");
                            None
                        }
                    },
                )
                .collect()
        })
        .unwrap_or_default();

    Ok(EvaluationReport::new(
        ExecutionSummary::new(execution.counts.passed, execution.counts.failed),
        execution.coverage_percent,
        recommendations,
        findings,
    ))
}

/// Assembles a [`Pipeline`] from concrete collaborator implementations.
///
/// The approver defaults to [`AutoApprover`]; everything else is required.
#[derive(Default)]
pub struct PipelineBuilder {
    identifier: Option<Arc<dyn IdentificationAgent>>,
    implementer: Option<Arc<dyn ImplementationAgent>>,
    evaluator: Option<Arc<dyn EvaluationAgent>>,
    approver: Option<Arc<dyn ScenarioApprover>>,
    workspace: Option<Arc<dyn Workspace>>,
    runner: Option<Arc<dyn TestRunner>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn identification_agent(mut self, agent: Arc<dyn IdentificationAgent>) -> Self {
        self.identifier = Some(agent);
        self
    }

    #[must_use]
    pub fn implementation_agent(mut self, agent: Arc<dyn ImplementationAgent>) -> Self {
        self.implementer = Some(agent);
        self
    }

    #[must_use]
    pub fn evaluation_agent(mut self, agent: Arc<dyn EvaluationAgent>) -> Self {
        self.evaluator = Some(agent);
        self
    }

    #[must_use]
    pub fn approver(mut self, approver: Arc<dyn ScenarioApprover>) -> Self {
        self.approver = Some(approver);
        self
    }

    #[must_use]
    pub fn workspace(mut self, workspace: Arc<dyn Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    #[must_use]
    pub fn test_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        Ok(Pipeline {
            identifier: self
                .identifier
                .ok_or(BuildError::MissingCollaborator("identification agent"))?,
            implementer: self
                .implementer
                .ok_or(BuildError::MissingCollaborator("implementation agent"))?,
            evaluator: self
                .evaluator
                .ok_or(BuildError::MissingCollaborator("evaluation agent"))?,
            approver: self.approver.unwrap_or_else(|| Arc::new(AutoApprover)),
            workspace: self
                .workspace
                .ok_or(BuildError::MissingCollaborator("workspace"))?,
            runner: self
                .runner
                .ok_or(BuildError::MissingCollaborator("test runner"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testforge_extract::TestCounts;

    fn execution(passed: u32, failed: u32, coverage: f64) -> TestExecution {
        TestExecution {
            output: ExecutionOutput::default(),
            counts: TestCounts {
                total: passed + failed,
                passed,
                failed,
            },
            coverage_percent: coverage,
        }
    }

    #[test]
    fn evaluation_overrides_agent_numbers_with_measured_values() {
        let raw = r#"{
            "execution_summary": {"total_tests": 99, "passed": 99, "failed": 0},
            "code_coverage_percentage": 100.0,
            "actionable_recommendations": ["add edge case tests"],
            "security_issues": []
        }"#;
        let report = parse_evaluation(raw, &execution(10, 2, 74.5)).unwrap();
        assert_eq!(report.summary.passed, 10);
        assert_eq!(report.summary.failed, 2);
        assert_eq!(report.summary.total_tests, 12);
        assert_eq!(report.coverage_percent, 74.5);
        assert_eq!(report.recommendations, vec!["add edge case tests"]);
    }

    #[test]
    fn evaluation_recomputes_severe_flag() {
        let raw = r#"{
            "execution_summary": {},
            "has_severe_security_issues": false,
            "security_issues": [
                {"severity": "medium", "issue": "a", "location": "x", "recommendation": "r"},
                {"severity": "critical", "issue": "b", "location": "y", "recommendation": "r"}
            ]
        }"#;
        let report = parse_evaluation(raw, &execution(1, 0, 50.0)).unwrap();
        assert!(report.has_severe_findings);
        assert_eq!(report.findings.len(), 2);
    }

    #[test]
    fn evaluation_skips_malformed_finding_entries() {
        let raw = r#"{
            "execution_summary": {},
            "security_issues": ["not an object", {"severity": "low", "issue": "x"}]
        }"#;
        let report = parse_evaluation(raw, &execution(1, 0, 10.0)).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert!(!report.has_severe_findings);
    }

    #[test]
    fn evaluation_without_required_key_is_malformed() {
        let err = parse_evaluation("{}", &execution(0, 0, 0.0)).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[test]
    fn builder_requires_all_agents() {
        let err = Pipeline::builder().build().unwrap_err();
        assert!(err.to_string().contains("identification agent"));
    }
}
