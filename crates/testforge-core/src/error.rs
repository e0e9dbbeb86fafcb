//! Error types for the orchestrator
//!
//! The taxonomy mirrors the propagation policy: only true collaborator
//! failures (agent, runner spawn, filesystem write) abort a run. Runner
//! timeouts, missing coverage reports and repair exhaustion are degrades
//! handled inline, so they have no variants here.

use testforge_extract::ExtractError;
use testforge_model::TransitionError;

/// Errors that terminate a pipeline run as `failed`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Zero analyzable files, or the identification agent produced an
    /// empty scenario set.
    #[error("no analyzable source found")]
    NoSourceFound,

    /// An agent, runner or filesystem collaborator raised. The message is
    /// captured verbatim into the run's error field.
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// An agent response could not be parsed into structured data.
    #[error(transparent)]
    MalformedResponse(#[from] ExtractError),

    /// The orchestrator attempted an illegal state transition. Indicates
    /// a bug in the driver, not in collaborators.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The run was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem error from a workspace collaborator.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap a collaborator failure message
    #[inline]
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }
}

/// Errors from assembling a [`crate::pipeline::Pipeline`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required collaborator was never supplied to the builder
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}
