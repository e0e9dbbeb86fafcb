//! Evaluation output: execution summary, security findings, report

use serde::{Deserialize, Serialize};

/// Severity of a security finding.
///
/// Deserialization is lenient: the evaluation agent sometimes invents
/// severity labels, and anything unrecognized maps to [`Severity::Low`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// A finding is severe when it is critical or high.
    #[inline]
    #[must_use]
    pub fn is_severe(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        })
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A security issue reported by the evaluation agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFinding {
    #[serde(default)]
    pub severity: Severity,
    /// What the issue is
    #[serde(default, alias = "issue")]
    pub description: String,
    /// Where it was found (file, function, line - free text)
    #[serde(default)]
    pub location: String,
    /// Suggested fix
    #[serde(default, alias = "recommendation")]
    pub remediation: String,
}

/// Summary of one test execution.
///
/// Invariant: `passed + failed == total_tests`. [`ExecutionSummary::new`]
/// derives the total so the invariant holds by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tests: u32,
    pub passed: u32,
    pub failed: u32,
}

impl ExecutionSummary {
    /// Build a summary from passed/failed counts
    #[inline]
    #[must_use]
    pub fn new(passed: u32, failed: u32) -> Self {
        Self {
            total_tests: passed + failed,
            passed,
            failed,
        }
    }
}

/// Structured output of the evaluation agent, after the orchestrator has
/// overridden self-reported numbers with measured values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub summary: ExecutionSummary,
    /// Measured line coverage, clamped to [0, 100]
    pub coverage_percent: f64,
    /// Actionable recommendations from the agent
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Security findings from the agent
    #[serde(default)]
    pub findings: Vec<SecurityFinding>,
    /// True when any finding is critical or high.
    ///
    /// Always recomputed locally via [`EvaluationReport::recompute_severe`];
    /// the agent's self-report is not trusted.
    #[serde(default)]
    pub has_severe_findings: bool,
}

impl EvaluationReport {
    /// Create a report from measured values, recomputing the severe flag.
    #[must_use]
    pub fn new(
        summary: ExecutionSummary,
        coverage_percent: f64,
        recommendations: Vec<String>,
        findings: Vec<SecurityFinding>,
    ) -> Self {
        let mut report = Self {
            summary,
            coverage_percent: coverage_percent.clamp(0.0, 100.0),
            recommendations,
            findings,
            has_severe_findings: false,
        };
        report.recompute_severe();
        report
    }

    /// Derive `has_severe_findings` from the findings list, overwriting
    /// whatever the agent claimed.
    pub fn recompute_severe(&mut self) {
        self.has_severe_findings = self.findings.iter().any(|f| f.severity.is_severe());
    }

    /// The subset of findings with critical or high severity.
    pub fn severe_findings(&self) -> impl Iterator<Item = &SecurityFinding> {
        self.findings.iter().filter(|f| f.severity.is_severe())
    }
}
