//! Test scenarios produced by the identification agent

use serde::{Deserialize, Serialize};

/// Scenario priority as reported by the identification agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "high")]
    High,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// A single test scenario.
///
/// Immutable once produced by the identification agent; consumed by the
/// implementation agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScenario {
    /// Free-text description of what should be tested
    #[serde(alias = "scenario_description")]
    pub description: String,
    /// Agent-assigned priority
    pub priority: Priority,
}

impl TestScenario {
    /// Create a new scenario
    #[inline]
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            description: description.into(),
            priority,
        }
    }
}

/// Ordered collection of test scenarios.
///
/// Insertion order is the agent output order. Duplicates are allowed at
/// the type level; [`ScenarioSet::dedup`] drops repeats by normalized
/// description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSet {
    scenarios: Vec<TestScenario>,
}

impl ScenarioSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scenario, preserving order
    #[inline]
    pub fn push(&mut self, scenario: TestScenario) {
        self.scenarios.push(scenario);
    }

    /// Append every scenario from another set
    pub fn extend(&mut self, other: ScenarioSet) {
        self.scenarios.extend(other.scenarios);
    }

    /// Number of scenarios
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TestScenario> {
        self.scenarios.iter()
    }

    /// Remove the scenarios at the given zero-based indices.
    ///
    /// Out-of-range indices are ignored. Used by approval layers that let
    /// a human strike scenarios from the list.
    pub fn remove_indices(&mut self, indices: &[usize]) {
        let mut i = 0usize;
        self.scenarios.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
    }

    /// Drop scenarios whose trimmed, case-insensitive description was
    /// already seen, keeping the first occurrence.
    #[must_use]
    pub fn dedup(self) -> Self {
        let mut seen = std::collections::HashSet::new();
        let scenarios = self
            .scenarios
            .into_iter()
            .filter(|s| seen.insert(s.description.trim().to_lowercase()))
            .collect();
        Self { scenarios }
    }
}

impl From<Vec<TestScenario>> for ScenarioSet {
    fn from(scenarios: Vec<TestScenario>) -> Self {
        Self { scenarios }
    }
}

impl IntoIterator for ScenarioSet {
    type Item = TestScenario;
    type IntoIter = std::vec::IntoIter<TestScenario>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenarios.into_iter()
    }
}
