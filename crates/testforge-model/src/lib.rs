//! Data model for the testforge pipeline
//!
//! Defines the value types that flow between the orchestrator and its
//! collaborators:
//! - Test scenarios and their priorities
//! - Security findings and evaluation reports
//! - The pipeline run entity and its state machine
//! - Run configuration
//!
//! Everything here is plain data: no I/O, no agent calls. The orchestrator
//! in `testforge-core` is the sole writer of a [`PipelineRun`].

#![warn(unreachable_pub)]

pub mod config;
pub mod report;
pub mod run;
pub mod scenario;

pub use config::RunConfig;
pub use report::{EvaluationReport, ExecutionSummary, SecurityFinding, Severity};
pub use run::{PipelineRun, RunId, RunStatus, TransitionError};
pub use scenario::{Priority, ScenarioSet, TestScenario};
