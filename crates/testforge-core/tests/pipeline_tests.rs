//! End-to-end orchestrator tests with scripted collaborators.
//!
//! Collaborators are hand-rolled fakes over a real temp directory so the
//! artifact write path and coverage report lookup behave exactly as they
//! would against a real project tree.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;
use testforge_core::{
    DirEntry, EvaluationAgent, ExecutionOutput, GenerationRequest, IdentificationAgent,
    ImplementationAgent, Pipeline, PipelineError, TestExecution, TestRunner, Workspace,
    RUNNER_TIMEOUT,
};
use testforge_model::{Priority, RunConfig, RunStatus, ScenarioSet, TestScenario};
use tokio_util::sync::CancellationToken;

/// Workspace over the real filesystem, scoped to a temp dir by the tests.
struct FsTestWorkspace;

#[async_trait]
impl Workspace for FsTestWorkspace {
    async fn read_file(&self, path: &Path) -> Result<String, PipelineError> {
        Ok(std::fs::read_to_string(path)?)
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, PipelineError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }
}

enum IdentifyScript {
    Scenarios(Vec<TestScenario>),
    Fail(String),
}

struct StubIdentifier {
    script: IdentifyScript,
}

#[async_trait]
impl IdentificationAgent for StubIdentifier {
    async fn identify(
        &self,
        _source: &str,
        _files: &[PathBuf],
        _cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError> {
        match &self.script {
            IdentifyScript::Scenarios(scenarios) => Ok(scenarios.clone().into()),
            IdentifyScript::Fail(message) => Err(PipelineError::collaborator(message.clone())),
        }
    }
}

/// Implementation agent that replays canned responses and records every
/// request it receives.
struct RecordingImplementer {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    fallback: String,
}

impl RecordingImplementer {
    fn new(responses: Vec<&str>) -> Self {
        let fallback = responses.last().map(|s| s.to_string()).unwrap_or_default();
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
            fallback,
        }
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImplementationAgent for RecordingImplementer {
    async fn generate(
        &self,
        request: GenerationRequest,
        _cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

struct StubEvaluator {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
}

impl StubEvaluator {
    fn new(responses: Vec<&str>) -> Self {
        let fallback = responses.last().map(|s| s.to_string()).unwrap_or_default();
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            fallback,
        }
    }
}

#[async_trait]
impl EvaluationAgent for StubEvaluator {
    async fn evaluate(
        &self,
        _execution: &TestExecution,
        _scenarios: &ScenarioSet,
        _source: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Runner that replays stdout scripts and plants a coverage report at the
/// project root before returning, the way pytest-cov would.
struct ScriptedRunner {
    stdout: Mutex<VecDeque<String>>,
    coverage: Mutex<VecDeque<Option<f64>>>,
    root: PathBuf,
    calls: AtomicU32,
}

impl ScriptedRunner {
    fn new(root: &Path, script: Vec<(&str, Option<f64>)>) -> Self {
        Self {
            stdout: Mutex::new(script.iter().map(|(s, _)| s.to_string()).collect()),
            coverage: Mutex::new(script.iter().map(|(_, c)| *c).collect()),
            root: root.to_path_buf(),
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn run(
        &self,
        _artifact: &Path,
        _workdir: &Path,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(percent) = self.coverage.lock().unwrap().pop_front().flatten() {
            let report = format!(r#"{{"totals": {{"percent_covered": {percent}}}}}"#);
            std::fs::write(self.root.join("coverage.json"), report)?;
        }
        let stdout = self
            .stdout
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "no tests ran".to_string());
        Ok(ExecutionOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        })
    }
}

fn scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new("Exercises the happy path", Priority::High),
        TestScenario::new("Rejects malformed input", Priority::Medium),
    ]
}

fn project_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("app.py"),
        "def add(a, b):\n    return a + b\n",
    )
    .unwrap();
    dir
}

const CLEAN_EVALUATION: &str = r#"{
    "execution_summary": {"total_tests": 0, "passed": 0, "failed": 0},
    "actionable_recommendations": [],
    "security_issues": []
}"#;

fn build_pipeline(
    identifier: StubIdentifier,
    implementer: Arc<RecordingImplementer>,
    evaluator: StubEvaluator,
    runner: Arc<ScriptedRunner>,
) -> Pipeline {
    Pipeline::builder()
        .identification_agent(Arc::new(identifier))
        .implementation_agent(implementer)
        .evaluation_agent(Arc::new(evaluator))
        .workspace(Arc::new(FsTestWorkspace))
        .test_runner(runner)
        .build()
        .unwrap()
}

#[tokio::test]
async fn clean_run_completes_after_one_iteration() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "```python\ndef test_add():\n    assert add(1, 2) == 3\n```",
    ]));
    let runner = Arc::new(ScriptedRunner::new(
        dir.path(),
        vec![("10 passed in 0.4s", Some(95.0))],
    ));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let run = pipeline
        .run(&RunConfig::new(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 1);
    assert_eq!(runner.call_count(), 1);
    assert!(run.error_message.is_none());

    let evaluation = run.evaluation.expect("evaluation attached");
    assert_eq!(evaluation.summary.passed, 10);
    assert_eq!(evaluation.summary.failed, 0);
    assert_eq!(evaluation.coverage_percent, 95.0);
    assert!(!evaluation.has_severe_findings);

    // The sanitized artifact landed under <target>/tests.
    let artifact = run.artifact_path.expect("artifact written");
    let written = std::fs::read_to_string(&artifact).unwrap();
    assert_eq!(written, "def test_add():\n    assert add(1, 2) == 3");

    // Exactly one generation request, fresh mode.
    let requests = implementer.requests();
    assert_eq!(requests.len(), 1);
    assert!(matches!(requests[0], GenerationRequest::Fresh { .. }));
}

#[tokio::test]
async fn stubbornly_invalid_code_terminates_with_best_effort() {
    // Implementation and repair always return the same unbalanced code.
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec!["def test_broken(:\n    pass"]));
    let runner = Arc::new(ScriptedRunner::new(
        dir.path(),
        vec![("1 error in 0.1s", None)],
    ));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let config = RunConfig::new(dir.path()).with_max_iterations(1);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    // Exactly one pipeline iteration; the run does not throw.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 1);

    // One fresh generation plus at most three repair attempts, and no
    // improvement call once the budget is spent.
    let requests = implementer.requests();
    assert!(matches!(requests[0], GenerationRequest::Fresh { .. }));
    let repairs = requests
        .iter()
        .filter(|r| matches!(r, GenerationRequest::Repair { .. }))
        .count();
    assert_eq!(repairs, 3);
    assert!(!requests
        .iter()
        .any(|r| matches!(r, GenerationRequest::Improve { .. })));

    // Best-effort code is used as-is.
    assert_eq!(run.generated_code, "def test_broken(:\n    pass");
}

#[tokio::test]
async fn improvement_loop_feeds_hints_and_severe_findings() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_one():\n    assert add(1, 1) == 2",
        "def test_two():\n    assert add(0, 0) == 0",
    ]));
    // First execution: low coverage and an uncovered-area row. Second: clean.
    let first_stdout = "\
1 passed in 0.2s
app.py         40      8    50%   5-10, 22
";
    let runner = Arc::new(ScriptedRunner::new(
        dir.path(),
        vec![(first_stdout, Some(50.0)), ("2 passed in 0.2s", Some(96.0))],
    ));
    let severe_evaluation = r#"{
        "execution_summary": {},
        "security_issues": [
            {"severity": "critical", "issue": "eval on user input", "location": "app.py:3", "recommendation": "remove eval"}
        ]
    }"#;
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![severe_evaluation, CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let run = pipeline
        .run(&RunConfig::new(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 2);
    assert_eq!(runner.call_count(), 2);

    let requests = implementer.requests();
    assert_eq!(requests.len(), 2);
    match &requests[1] {
        GenerationRequest::Improve {
            coverage_percent,
            uncovered_hints,
            severe_findings,
            existing_code,
            ..
        } => {
            assert_eq!(*coverage_percent, 50.0);
            assert!(uncovered_hints.contains("app.py: lines 5-10, 22"));
            assert_eq!(severe_findings.len(), 1);
            assert!(severe_findings[0].description.contains("eval"));
            assert!(existing_code.contains("test_one"));
        }
        other => panic!("expected improvement request, got {other:?}"),
    }

    // The improved code replaced the artifact.
    assert!(run.generated_code.contains("test_two"));
}

#[tokio::test]
async fn budget_exhaustion_completes_with_evaluation_attached() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_only():\n    pass",
    ]));
    let runner = Arc::new(ScriptedRunner::new(
        dir.path(),
        vec![("1 passed in 0.1s", Some(40.0))],
    ));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let config = RunConfig::new(dir.path()).with_max_iterations(2);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    // Exhaustion is still `completed`; callers distinguish it by the
    // attached evaluation and iteration count.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 2);
    let evaluation = run.evaluation.expect("evaluation attached");
    assert!(evaluation.coverage_percent < 90.0);
}

#[tokio::test]
async fn generation_only_run_skips_the_loop() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_add():\n    assert add(2, 2) == 4",
    ]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let config = RunConfig::new(dir.path()).with_auto_run_tests(false);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 0);
    assert_eq!(runner.call_count(), 0);
    assert!(run.evaluation.is_none());
    assert!(run.artifact_path.is_some());
}

#[tokio::test]
async fn collaborator_failure_fails_the_run_verbatim() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec!["unused"]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Fail("model transport unavailable".into()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let run = pipeline
        .run(&RunConfig::new(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    let message = run.error_message.expect("message captured");
    assert!(message.contains("model transport unavailable"));
}

#[tokio::test]
async fn empty_scenario_set_is_no_source_found() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec!["unused"]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(vec![]),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let run = pipeline
        .run(&RunConfig::new(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error_message
        .unwrap()
        .contains("no analyzable source found"));
}

#[tokio::test]
async fn target_without_sources_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "not python").unwrap();
    let implementer = Arc::new(RecordingImplementer::new(vec!["unused"]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let run = pipeline
        .run(&RunConfig::new(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error_message
        .unwrap()
        .contains("no analyzable source found"));
}

#[tokio::test]
async fn pre_cancelled_token_fails_immediately() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec!["unused"]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let run = pipeline.run(&RunConfig::new(dir.path()), &cancel).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().contains("cancelled"));
    assert!(implementer.requests().is_empty());
}

/// Runner that never finishes inside the wall-clock budget.
struct StalledRunner;

#[async_trait]
impl TestRunner for StalledRunner {
    async fn run(
        &self,
        _artifact: &Path,
        _workdir: &Path,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, PipelineError> {
        tokio::time::sleep(RUNNER_TIMEOUT + Duration::from_secs(60)).await;
        Ok(ExecutionOutput {
            exit_code: 0,
            stdout: "99 passed".to_string(),
            stderr: String::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn runner_timeout_degrades_to_zero_result_execution() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_slow():\n    pass",
    ]));
    let pipeline = Pipeline::builder()
        .identification_agent(Arc::new(StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        }))
        .implementation_agent(Arc::clone(&implementer) as Arc<dyn ImplementationAgent>)
        .evaluation_agent(Arc::new(StubEvaluator::new(vec![CLEAN_EVALUATION])))
        .workspace(Arc::new(FsTestWorkspace))
        .test_runner(Arc::new(StalledRunner))
        .build()
        .unwrap();

    let config = RunConfig::new(dir.path()).with_max_iterations(1);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    // Expiry is a zero-result execution, not a run failure: the loop
    // carried on to evaluation.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 1);
    assert!(run.error_message.is_none());

    let evaluation = run.evaluation.expect("evaluation attached");
    assert_eq!(evaluation.summary.total_tests, 0);
    assert_eq!(evaluation.summary.passed, 0);
    assert_eq!(evaluation.summary.failed, 0);
    assert_eq!(evaluation.coverage_percent, 0.0);
}

#[tokio::test]
async fn coverage_regression_restores_best_snapshot() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_first():\n    assert add(1, 1) == 2",
        "def test_second():\n    assert add(0, 0) == 0",
    ]));
    // Coverage drops from 60% to 30% after the improvement pass.
    let runner = Arc::new(ScriptedRunner::new(
        dir.path(),
        vec![
            ("1 passed in 0.1s", Some(60.0)),
            ("1 passed in 0.1s", Some(30.0)),
        ],
    ));
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(scenarios()),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let config = RunConfig::new(dir.path()).with_max_iterations(2);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.iteration, 2);
    assert_eq!(runner.call_count(), 2);

    // The second iteration regressed, so the first iteration's code wins.
    assert!(run.generated_code.contains("test_first"));
    let artifact = run.artifact_path.expect("artifact written");
    let written = std::fs::read_to_string(&artifact).unwrap();
    assert!(written.contains("test_first"));
    assert!(!written.contains("test_second"));

    // The attached evaluation still reflects the final measurement.
    assert_eq!(run.evaluation.expect("evaluation attached").coverage_percent, 30.0);
}

#[tokio::test]
async fn duplicate_scenarios_are_deduplicated() {
    let dir = project_dir();
    let implementer = Arc::new(RecordingImplementer::new(vec![
        "def test_add():\n    pass",
    ]));
    let runner = Arc::new(ScriptedRunner::new(dir.path(), vec![]));
    let duplicated = vec![
        TestScenario::new("Exercises the happy path", Priority::High),
        TestScenario::new("exercises the happy path", Priority::Low),
    ];
    let pipeline = build_pipeline(
        StubIdentifier {
            script: IdentifyScript::Scenarios(duplicated),
        },
        Arc::clone(&implementer),
        StubEvaluator::new(vec![CLEAN_EVALUATION]),
        Arc::clone(&runner),
    );

    let config = RunConfig::new(dir.path()).with_auto_run_tests(false);
    let run = pipeline.run(&config, &CancellationToken::new()).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.scenarios.len(), 1);
    assert_eq!(run.approved_scenarios.len(), 1);
}
