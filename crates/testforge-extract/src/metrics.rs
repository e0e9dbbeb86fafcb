//! Metrics extraction from raw test runner output
//!
//! Pattern-based, not a full log parser: the runner's textual summary is
//! scanned for count patterns, and the structured coverage report is read
//! if present. Every failure mode here degrades to zero values - a missing
//! pattern or an unreadable report is never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static PASSED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) passed").expect("valid regex"));
static FAILED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) failed").expect("valid regex"));
static ERRORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) error").expect("valid regex"));

/// Per-file row of a pytest-cov term-missing table:
/// `file.py   10   2   80%   5-6, 12`
static TERM_MISSING_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+\.py)\s+\d+\s+\d+\s+\d+%\s+(.+)$").expect("valid regex"));

/// Fallback when no coverage rows match.
pub const NO_UNCOVERED_AREAS: &str = "No specific uncovered areas identified";

/// Test counts parsed from runner output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

fn first_count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Parse passed/failed/error counts from the runner's textual summary.
///
/// Errored tests count as failures. Absence of a pattern yields 0.
#[must_use]
pub fn parse_test_counts(stdout: &str) -> TestCounts {
    let passed = first_count(&PASSED, stdout);
    let failed = first_count(&FAILED, stdout) + first_count(&ERRORS, stdout);
    TestCounts {
        total: passed + failed,
        passed,
        failed,
    }
}

/// Read overall percent covered from the `coverage.json` report colocated
/// with the test artifact.
///
/// The runner executes from the artifact's parent's parent (project root
/// with a `tests/` dir), so the report is looked up there first, then next
/// to the artifact. Any read or parse failure yields 0.0; a missing report
/// is not fatal.
#[must_use]
pub fn parse_coverage(artifact_path: &Path) -> f64 {
    let mut candidates = Vec::new();
    if let Some(dir) = artifact_path.parent() {
        if let Some(root) = dir.parent() {
            candidates.push(root.join("coverage.json"));
        }
        candidates.push(dir.join("coverage.json"));
    }

    for path in candidates {
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(data) => {
                    if let Some(pct) = data["totals"]["percent_covered"].as_f64() {
                        return pct.clamp(0.0, 100.0);
                    }
                    tracing::warn!(path = %path.display(), "coverage report has no totals");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unparseable coverage report");
                }
            },
            Err(_) => continue,
        }
    }
    0.0
}

/// Collect uncovered-area hints from pytest-cov's term-missing table.
///
/// Each matching row becomes `file.py: lines 5-6, 12`; rows are joined
/// with newlines for the next improvement prompt. When nothing matches,
/// the fixed fallback string is returned.
#[must_use]
pub fn extract_uncovered_areas(stdout: &str) -> String {
    let mut areas = Vec::new();
    for line in stdout.lines() {
        if let Some(caps) = TERM_MISSING_ROW.captures(line.trim()) {
            let missing = caps[2].trim();
            if !missing.is_empty() {
                areas.push(format!("{}: lines {}", &caps[1], missing));
            }
        }
    }
    if areas.is_empty() {
        NO_UNCOVERED_AREAS.to_string()
    } else {
        areas.join("\n")
    }
}

/// Group sorted line numbers into compact ranges: `[5,6,7,10]` becomes
/// `"5-7, 10"`. Used when formatting hints from structured coverage data.
#[must_use]
pub fn group_lines_to_ranges(lines: &[u32]) -> String {
    let Some((&first, rest)) = lines.split_first() else {
        return String::new();
    };

    let mut ranges = Vec::new();
    let (mut start, mut end) = (first, first);
    for &line in rest {
        if line == end + 1 {
            end = line;
        } else {
            ranges.push(format_range(start, end));
            start = line;
            end = line;
        }
    }
    ranges.push(format_range(start, end));
    ranges.join(", ")
}

fn format_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn parses_summary_line() {
        let counts = parse_test_counts("12 passed, 3 failed in 2.1s");
        assert_eq!(
            counts,
            TestCounts {
                total: 15,
                passed: 12,
                failed: 3
            }
        );
    }

    #[test]
    fn no_match_yields_zeroes() {
        assert_eq!(parse_test_counts("no matches"), TestCounts::default());
    }

    #[test]
    fn errors_count_as_failures() {
        let counts = parse_test_counts("5 passed, 1 failed, 2 errors in 0.3s");
        assert_eq!(counts.failed, 3);
        assert_eq!(counts.total, 8);
    }

    #[test]
    fn passed_only_summary() {
        let counts = parse_test_counts("========= 10 passed in 1.02s =========");
        assert_eq!(counts.passed, 10);
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.total, 10);
    }

    #[test]
    fn coverage_read_from_project_root() {
        let root = tempfile::tempdir().unwrap();
        let tests_dir = root.path().join("tests");
        std::fs::create_dir(&tests_dir).unwrap();
        let artifact = tests_dir.join("test_generated_1.py");
        std::fs::write(&artifact, "def test_ok():\n    pass\n").unwrap();

        let mut report = std::fs::File::create(root.path().join("coverage.json")).unwrap();
        write!(report, r#"{{"totals": {{"percent_covered": 87.5}}}}"#).unwrap();

        assert_eq!(parse_coverage(&artifact), 87.5);
    }

    #[test]
    fn missing_coverage_report_is_zero() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(parse_coverage(&root.path().join("tests/test_x.py")), 0.0);
    }

    #[test]
    fn malformed_coverage_report_is_zero() {
        let root = tempfile::tempdir().unwrap();
        let tests_dir = root.path().join("tests");
        std::fs::create_dir(&tests_dir).unwrap();
        std::fs::write(root.path().join("coverage.json"), "not json").unwrap();
        assert_eq!(parse_coverage(&tests_dir.join("test_x.py")), 0.0);
    }

    #[test]
    fn uncovered_areas_from_term_missing_rows() {
        let stdout = "\
Name        Stmts   Miss  Cover   Missing
-----------------------------------------
app.py         40      8    80%   5-10, 22
util.py        12      0   100%
-----------------------------------------
TOTAL          52      8    85%
";
        let areas = extract_uncovered_areas(stdout);
        assert_eq!(areas, "app.py: lines 5-10, 22");
    }

    #[test]
    fn uncovered_areas_fallback() {
        assert_eq!(extract_uncovered_areas("2 passed in 0.1s"), NO_UNCOVERED_AREAS);
    }

    #[test]
    fn groups_consecutive_lines() {
        assert_eq!(group_lines_to_ranges(&[5, 6, 7, 10, 12, 13]), "5-7, 10, 12-13");
        assert_eq!(group_lines_to_ranges(&[4]), "4");
        assert_eq!(group_lines_to_ranges(&[]), "");
    }
}
