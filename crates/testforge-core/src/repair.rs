//! Bounded structural repair loop
//!
//! When generated code fails the bracket-balance check, the
//! implementation agent is asked to fix it, supplied the broken code and
//! the imbalance reason. At most [`MAX_REPAIR_ATTEMPTS`] repair calls are
//! made; if the code is still unbalanced afterwards it is used as-is.
//! Exhaustion is a deliberate trade-off (bounded cost over guaranteed
//! correctness), not an error.

use crate::error::PipelineError;
use crate::traits::{GenerationRequest, ImplementationAgent};
use testforge_extract::{check_balance, extract_code};
use tokio_util::sync::CancellationToken;

/// Repair-call budget per generated artifact.
pub const MAX_REPAIR_ATTEMPTS: u32 = 3;

/// Validate `code` and drive the repair loop until it balances or the
/// budget is spent. Agent failures propagate; a stubbornly unbalanced
/// result does not.
pub async fn repair_code(
    agent: &dyn ImplementationAgent,
    mut code: String,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    for attempt in 1..=MAX_REPAIR_ATTEMPTS {
        let verdict = check_balance(&code);
        if verdict.valid {
            return Ok(code);
        }
        tracing::warn!(
            attempt,
            reason = %verdict.reason,
            "generated code is structurally invalid, requesting repair"
        );
        let raw = agent
            .generate(
                GenerationRequest::Repair {
                    code: code.clone(),
                    reason: verdict.reason,
                },
                cancel,
            )
            .await?;
        code = extract_code(&raw);
    }

    let verdict = check_balance(&code);
    if !verdict.valid {
        tracing::warn!(
            reason = %verdict.reason,
            "repair budget exhausted, using best-effort code"
        );
    }
    Ok(code)
}
