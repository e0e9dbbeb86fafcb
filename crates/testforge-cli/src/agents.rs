//! LLM-backed agent implementations
//!
//! Each agent owns its prompt construction; the raw model text goes back
//! to the orchestrator, which sanitizes and parses it. Scenario entries
//! that fail to deserialize are skipped rather than failing the run, since
//! one malformed entry should not discard a usable batch.

use crate::llm::LlmClient;
use crate::prompts;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use testforge_core::{
    truncate_at_boundary, EvaluationAgent, GenerationRequest, IdentificationAgent,
    ImplementationAgent, PipelineError, TestExecution,
};
use testforge_extract::extract_json;
use testforge_model::{ScenarioSet, SecurityFinding, TestScenario};
use tokio_util::sync::CancellationToken;

const MAX_EXISTING_CODE_CHARS: usize = 6_000;
const MAX_OUTPUT_CHARS: usize = 2_000;
const MAX_EVAL_SOURCE_CHARS: usize = 15_000;

fn file_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| format!("  - {}", f.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Agent 1: scenario identification.
pub struct ScenarioIdentifier {
    client: LlmClient,
}

impl ScenarioIdentifier {
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentificationAgent for ScenarioIdentifier {
    async fn identify(
        &self,
        source: &str,
        files: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ScenarioSet, PipelineError> {
        let user = format!(
            "Analyze this Python codebase and identify test scenarios.\n\n\
             Files in project:\n{}\n\n\
             Source code:\n{}\n\n\
             Respond with JSON containing test_scenarios.",
            file_list(files),
            source,
        );

        let raw = self
            .client
            .complete(prompts::IDENTIFICATION_SYSTEM, &user, cancel)
            .await?;
        let value = extract_json(&raw, "test_scenarios")?;

        let mut scenarios = ScenarioSet::new();
        if let Some(items) = value["test_scenarios"].as_array() {
            for item in items {
                match serde_json::from_value::<TestScenario>(item.clone()) {
                    Ok(scenario) => scenarios.push(scenario),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unparseable scenario entry");
                    }
                }
            }
        }
        Ok(scenarios)
    }
}

/// Agent 2: test code generation, improvement and repair.
pub struct TestImplementer {
    client: LlmClient,
}

impl TestImplementer {
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn fresh_prompt(scenarios: &ScenarioSet, source: &str, files: &[PathBuf]) -> String {
        let scenarios_json =
            serde_json::to_string_pretty(scenarios).unwrap_or_else(|_| String::from("[]"));
        format!(
            "Generate PyTest tests for these scenarios:\n\n{}\n\n\
             PROJECT STRUCTURE:\n\
             - Tests will be saved to: tests/test_generated_*.py\n\
             - Source files are in the project root:\n{}\n\n\
             Source code:\n{}\n\n\
             IMPORTANT RULES:\n\
             1. Return ONLY valid Python code - no markdown, no code fences\n\
             2. Include all necessary imports at the top\n\
             3. Each test function must start with 'test_'\n\
             4. IMPORT source modules directly for coverage (add project root to sys.path first)\n\
             5. Use mocking for side effects (network, file I/O)\n\n\
             Generate a complete, executable PyTest file.",
            scenarios_json,
            file_list(files),
            source,
        )
    }

    fn improve_prompt(
        existing_code: &str,
        coverage_percent: f64,
        uncovered_hints: &str,
        severe_findings: &[SecurityFinding],
        source: &str,
        files: &[PathBuf],
    ) -> String {
        let mut security_context = String::new();
        if !severe_findings.is_empty() {
            security_context.push_str(
                "\n\nSECURITY ISSUES TO ADDRESS:\n\
                 Add tests that exercise these vulnerabilities with malicious input and\n\
                 verify proper error handling or input rejection:\n",
            );
            for finding in severe_findings {
                let _ = writeln!(
                    security_context,
                    "- [{}] {} at {}\n  Recommendation: {}",
                    finding.severity.to_string().to_uppercase(),
                    finding.description,
                    finding.location,
                    finding.remediation,
                );
            }
        }

        format!(
            "The current test suite needs improvements:\n\
             - Code coverage: {coverage_percent:.1}% (target: 90%+)\n\
             - Severe security issues: {} found\n\n\
             PROJECT STRUCTURE:\n\
             - Tests are saved in: tests/test_generated_*.py\n\
             - Source files are in the project root:\n{}\
             {security_context}\n\
             Existing tests (may have errors - fix them):\n{}\n\n\
             Uncovered code areas from coverage report:\n{uncovered_hints}\n\n\
             Source code to test:\n{}\n\n\
             IMPORTANT RULES:\n\
             1. Return ONLY valid Python code - NO markdown code fences\n\
             2. Fix any syntax errors from the existing tests\n\
             3. IMPORT source modules directly for coverage (add project root to sys.path first)\n\
             4. Each test function must start with 'test_'\n\n\
             Generate a complete, executable PyTest file that tests uncovered lines\n\
             and aims for 90%+ code coverage.",
            severe_findings.len(),
            file_list(files),
            truncate_at_boundary(existing_code, MAX_EXISTING_CODE_CHARS),
            source,
        )
    }

    fn repair_prompt(code: &str, reason: &str) -> String {
        format!(
            "SYNTAX PROBLEM DETECTED IN GENERATED TEST CODE\n\n\
             PROBLEM:\n{reason}\n\n\
             FULL GENERATED CODE:\n{code}\n\n\
             INSTRUCTIONS:\n\
             1. Fix ONLY the structural problem (maintain all test logic)\n\
             2. Return ONLY valid Python code with NO markdown formatting\n\
             3. Do NOT include code fences\n\
             4. Return the complete, corrected test file\n\n\
             Return the fixed code now:",
        )
    }
}

#[async_trait]
impl ImplementationAgent for TestImplementer {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let user = match &request {
            GenerationRequest::Fresh {
                scenarios,
                source,
                files,
            } => Self::fresh_prompt(scenarios, source, files),
            GenerationRequest::Improve {
                existing_code,
                coverage_percent,
                uncovered_hints,
                severe_findings,
                source,
                files,
            } => Self::improve_prompt(
                existing_code,
                *coverage_percent,
                uncovered_hints,
                severe_findings,
                source,
                files,
            ),
            GenerationRequest::Repair { code, reason } => Self::repair_prompt(code, reason),
        };

        self.client
            .complete(prompts::IMPLEMENTATION_SYSTEM, &user, cancel)
            .await
    }
}

/// Agent 3: evaluation with security analysis.
pub struct ResultEvaluator {
    client: LlmClient,
}

impl ResultEvaluator {
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EvaluationAgent for ResultEvaluator {
    async fn evaluate(
        &self,
        execution: &TestExecution,
        scenarios: &ScenarioSet,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let scenarios_json =
            serde_json::to_string_pretty(scenarios).unwrap_or_else(|_| String::from("[]"));
        let user = format!(
            "Evaluate these PyTest results AND perform security analysis:\n\n\
             Scenarios (summary): {}\n\n\
             Test Results:\n\
             - Total tests: {}\n\
             - Passed: {}\n\
             - Failed: {}\n\
             - Code Coverage: {:.1}%\n\n\
             PyTest Output:\n{}\n\n\
             Source Code (analyze for security issues):\n{}\n\n\
             Provide:\n\
             1. Actionable recommendations to improve test coverage and fix failures\n\
             2. Security analysis identifying vulnerabilities (SQL injection, XSS, command \
             injection, path traversal, hardcoded secrets, etc.)\n\
             3. Mark has_severe_security_issues as true if any critical or high severity issues exist\n\n\
             Respond with JSON containing execution_summary, code_coverage_percentage, \
             security_issues, has_severe_security_issues, and actionable_recommendations.",
            truncate_at_boundary(&scenarios_json, MAX_OUTPUT_CHARS),
            execution.counts.total,
            execution.counts.passed,
            execution.counts.failed,
            execution.coverage_percent,
            truncate_at_boundary(&execution.output.combined(), MAX_OUTPUT_CHARS),
            truncate_at_boundary(source, MAX_EVAL_SOURCE_CHARS),
        );

        self.client
            .complete(prompts::EVALUATION_SYSTEM, &user, cancel)
            .await
    }
}
