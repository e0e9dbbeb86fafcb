//! Text extraction layer for the testforge pipeline
//!
//! Language models return free text. This crate turns that text, and the
//! raw output of an external test runner, into structured data:
//!
//! - [`sanitize`] recovers JSON values and source code from responses that
//!   may wrap them in prose or markdown fences
//! - [`structural`] is the cheap bracket-balance check used to catch
//!   obviously broken generated code without a real parser
//! - [`metrics`] turns runner stdout and coverage reports into counts and
//!   percentages
//!
//! Everything here degrades conservatively: measurement failures yield
//! zero values, never errors. Only a malformed agent response is a hard
//! failure, surfaced as [`ExtractError::MalformedResponse`].

#![warn(unreachable_pub)]

pub mod error;
pub mod metrics;
pub mod sanitize;
pub mod structural;

pub use error::ExtractError;
pub use metrics::{extract_uncovered_areas, group_lines_to_ranges, parse_coverage, parse_test_counts, TestCounts};
pub use sanitize::{extract_code, extract_json};
pub use structural::{check_balance, Balance};
