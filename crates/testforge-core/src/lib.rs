//! testforge-core - the orchestration engine
//!
//! Turns three unreliable, free-text-producing LLM agents into a
//! deterministic, retryable, terminating control loop that produces an
//! executable test artifact plus a structured evaluation report.
//!
//! The flow: identify scenarios, approve, generate test code (sanitized,
//! balance-checked, repaired up to three times), then run/evaluate/improve
//! until the completion gate (coverage target AND no severe security
//! finding) is satisfied or the iteration budget runs out.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use testforge_core::Pipeline;
//! use testforge_model::RunConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::builder()
//!     .identification_agent(Arc::new(my_identifier))
//!     .implementation_agent(Arc::new(my_implementer))
//!     .evaluation_agent(Arc::new(my_evaluator))
//!     .workspace(Arc::new(my_fs))
//!     .test_runner(Arc::new(my_runner))
//!     .build()?;
//!
//! let run = pipeline
//!     .run(&RunConfig::new("./my_project"), &CancellationToken::new())
//!     .await;
//! println!("{} after {} iterations", run.status, run.iteration);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod gate;
pub mod pipeline;
pub mod repair;
pub mod sources;
pub mod traits;

pub use error::{BuildError, PipelineError};
pub use gate::completion_met;
pub use pipeline::{Pipeline, PipelineBuilder, RUNNER_TIMEOUT};
pub use repair::{repair_code, MAX_REPAIR_ATTEMPTS};
pub use sources::{discover_files, gather_sources, truncate_at_boundary, SourceSet};
pub use traits::{
    AutoApprover, DirEntry, EvaluationAgent, ExecutionOutput, GenerationRequest,
    IdentificationAgent, ImplementationAgent, ScenarioApprover, TestExecution, TestRunner,
    Workspace,
};

/// Prelude for assembling and driving pipelines
pub mod prelude {
    //! Common imports for working with the testforge pipeline
    pub use crate::{
        AutoApprover, EvaluationAgent, GenerationRequest, IdentificationAgent,
        ImplementationAgent, Pipeline, PipelineError, ScenarioApprover, TestRunner, Workspace,
    };
    pub use testforge_model::{PipelineRun, RunConfig, RunStatus};
}
