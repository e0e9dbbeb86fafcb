//! Completion gate
//!
//! Pure decision over the evaluation report: a run completes only when
//! measured coverage meets the target AND no severe security finding is
//! open. Both conjuncts are mandatory.

use testforge_model::EvaluationReport;

/// Whether the run may stop iterating.
#[inline]
#[must_use]
pub fn completion_met(report: &EvaluationReport, target_coverage: f64) -> bool {
    report.coverage_percent >= target_coverage && !report.has_severe_findings
}
