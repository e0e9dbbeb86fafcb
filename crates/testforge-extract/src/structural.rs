//! Structural balance check for generated code
//!
//! A cheap heuristic, not a parser: it counts `()`, `[]` and `{}`
//! independently and accepts the text only when all three balance. It is
//! blind to string and comment literals, so it accepts balanced-but-wrong
//! syntax and rejects correct code with unbalanced delimiters inside
//! strings. That weakness is part of the contract; callers drive a bounded
//! repair loop on rejection rather than expecting precision here.

/// Verdict of [`check_balance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub valid: bool,
    /// Human-readable imbalance description, empty when valid. Fed back to
    /// the repair agent as context.
    pub reason: String,
}

impl Balance {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: String::new(),
        }
    }

    fn invalid(reason: String) -> Self {
        Self {
            valid: false,
            reason,
        }
    }
}

/// Scan `code` once, maintaining independent counters per delimiter pair.
///
/// Valid only if all three counters end at zero. A counter dipping below
/// zero (a closer with no opener) is reported as an imbalance too.
#[must_use]
pub fn check_balance(code: &str) -> Balance {
    let mut paren: i64 = 0;
    let mut bracket: i64 = 0;
    let mut brace: i64 = 0;
    let mut underflow: Option<char> = None;

    for ch in code.chars() {
        match ch {
            '(' => paren += 1,
            ')' => paren -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            '{' => brace += 1,
            '}' => brace -= 1,
            _ => {}
        }
        if underflow.is_none() {
            if paren < 0 {
                underflow = Some(')');
            } else if bracket < 0 {
                underflow = Some(']');
            } else if brace < 0 {
                underflow = Some('}');
            }
        }
    }

    if let Some(closer) = underflow {
        return Balance::invalid(format!("unmatched closing '{closer}'"));
    }

    let mut problems = Vec::new();
    for (count, open, close) in [(paren, '(', ')'), (bracket, '[', ']'), (brace, '{', '}')] {
        if count > 0 {
            problems.push(format!("{count} unclosed '{open}'"));
        } else if count < 0 {
            problems.push(format!("{} unmatched '{close}'", -count));
        }
    }

    if problems.is_empty() {
        Balance::valid()
    } else {
        Balance::invalid(problems.join(", "))
    }
}
