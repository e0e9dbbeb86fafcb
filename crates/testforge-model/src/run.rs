//! Pipeline run entity and its state machine

use crate::report::EvaluationReport;
use crate::scenario::ScenarioSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States of a pipeline run.
///
/// `Completed` and `Failed` are terminal; any non-terminal state may move
/// to `Failed` when a collaborator call errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    PendingIdentification,
    AwaitingApproval,
    GeneratingTests,
    RunningTests,
    EvaluatingResults,
    ImprovingCoverage,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether this state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States reachable from this one.
    pub fn allowed_transitions(self) -> Vec<RunStatus> {
        use RunStatus::*;
        match self {
            PendingIdentification => vec![AwaitingApproval, Failed],
            AwaitingApproval => vec![GeneratingTests, Failed],
            GeneratingTests => vec![RunningTests, Completed, Failed],
            RunningTests => vec![EvaluatingResults, Failed],
            EvaluatingResults => vec![Completed, ImprovingCoverage, Failed],
            ImprovingCoverage => vec![RunningTests, Completed, Failed],
            Completed => vec![],
            Failed => vec![],
        }
    }

    fn allowed(self, to: RunStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PendingIdentification => "pending_identification",
            Self::AwaitingApproval => "awaiting_approval",
            Self::GeneratingTests => "generating_tests",
            Self::RunningTests => "running_tests",
            Self::EvaluatingResults => "evaluating_results",
            Self::ImprovingCoverage => "improving_coverage",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Illegal state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal run transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// The central owned entity of one pipeline execution.
///
/// Created at run start, mutated only by the orchestrator, handed to the
/// caller once a terminal state is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub status: RunStatus,
    /// Completed run-tests/evaluate iterations
    pub iteration: u32,
    /// Scenarios as identified by agent 1
    pub scenarios: ScenarioSet,
    /// Scenarios that survived approval
    pub approved_scenarios: ScenarioSet,
    /// Latest generated test code
    pub generated_code: String,
    /// Where the test artifact was written
    pub artifact_path: Option<PathBuf>,
    /// Latest evaluation report, if the loop ran at least once
    pub evaluation: Option<EvaluationReport>,
    /// Failure message when status is `Failed`
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Create a fresh run in the initial state
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            status: RunStatus::PendingIdentification,
            iteration: 0,
            scenarios: ScenarioSet::new(),
            approved_scenarios: ScenarioSet::new(),
            generated_code: String::new(),
            artifact_path: None,
            evaluation: None,
            error_message: None,
            started_at: Utc::now(),
        }
    }

    /// Move to a new state, validating the transition.
    ///
    /// Transition to `Failed` is allowed from any non-terminal state.
    pub fn transition(&mut self, to: RunStatus) -> Result<(), TransitionError> {
        let from = self.status;
        if to == RunStatus::Failed && !from.is_terminal() {
            self.status = to;
            return Ok(());
        }
        if !from.allowed(to) {
            return Err(TransitionError { from, to });
        }
        self.status = to;
        Ok(())
    }

    /// Mark the run failed, capturing the message verbatim.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Failed;
        }
        self.error_message = Some(message.into());
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
