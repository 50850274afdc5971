//! Tiered result equivalence.
//!
//! Tiers are checked in order and their score ranges do not overlap, so the
//! score alone says which tier decided it:
//!
//! | tier               | score                    |
//! |--------------------|--------------------------|
//! | execution failed   | 0                        |
//! | column mismatch    | 0.25                     |
//! | row count mismatch | 0.5 + 0.25 * min/max     |
//! | different values   | 0.75                     |
//! | exact              | 1                        |

use std::collections::HashSet;

use serde::Serialize;

use crate::backend::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExecutionFailed,
    ColumnMismatch,
    RowCountMismatch,
    ValueMismatch,
    Exact,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::ExecutionFailed => write!(f, "execution-failed"),
            MatchTier::ColumnMismatch => write!(f, "column-mismatch"),
            MatchTier::RowCountMismatch => write!(f, "row-count-mismatch"),
            MatchTier::ValueMismatch => write!(f, "value-mismatch"),
            MatchTier::Exact => write!(f, "exact"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub score: f64,
    pub reason: String,
    pub tier: MatchTier,
}

impl ComparisonOutcome {
    fn new(tier: MatchTier, score: f64, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
            tier,
        }
    }
}

/// Grade `actual` against `expected`.
pub fn compare(expected: &QueryResult, actual: &QueryResult) -> ComparisonOutcome {
    if !expected.success || !actual.success {
        let reason = if !expected.success {
            format!("expected query failed: {}", error_text(expected))
        } else {
            format!("generated query failed: {}", error_text(actual))
        };
        return ComparisonOutcome::new(MatchTier::ExecutionFailed, 0.0, reason);
    }

    let expected_cols = expected.columns();
    let actual_cols = actual.columns();
    let expected_set: HashSet<&str> = expected_cols.iter().map(String::as_str).collect();
    let actual_set: HashSet<&str> = actual_cols.iter().map(String::as_str).collect();

    let missing: Vec<&str> = expected_cols
        .iter()
        .map(String::as_str)
        .filter(|c| !actual_set.contains(c))
        .collect();
    let extra: Vec<&str> = actual_cols
        .iter()
        .map(String::as_str)
        .filter(|c| !expected_set.contains(c))
        .collect();

    if !missing.is_empty() || !extra.is_empty() {
        return ComparisonOutcome::new(
            MatchTier::ColumnMismatch,
            0.25,
            format!(
                "column mismatch: missing [{}], extra [{}]",
                missing.join(", "),
                extra.join(", ")
            ),
        );
    }

    if expected.row_count != actual.row_count {
        let low = expected.row_count.min(actual.row_count) as f64;
        let high = expected.row_count.max(actual.row_count) as f64;
        return ComparisonOutcome::new(
            MatchTier::RowCountMismatch,
            0.5 + (low / high) * 0.25,
            format!(
                "row count mismatch: expected {}, got {}",
                expected.row_count, actual.row_count
            ),
        );
    }

    if columns_equal(expected.data(), actual.data()) {
        ComparisonOutcome::new(MatchTier::Exact, 1.0, "exact match")
    } else {
        ComparisonOutcome::new(
            MatchTier::ValueMismatch,
            0.75,
            "same structure but different values",
        )
    }
}

fn error_text(result: &QueryResult) -> &str {
    result.error.as_deref().unwrap_or("unknown error")
}

fn columns_equal(a: &[Vec<serde_json::Value>], b: &[Vec<serde_json::Value>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(ca, cb)| {
            ca.len() == cb.len() && ca.iter().zip(cb).all(|(x, y)| cells_equal(x, y))
        })
}

/// Structural equality in which numbers compare by value, so `1` and `1.0`
/// are the same cell.
fn cells_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
            x.as_f64() == y.as_f64()
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| cells_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| cells_equal(x, y)))
        }
        _ => a == b,
    }
}
