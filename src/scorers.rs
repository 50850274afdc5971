//! Static text scorers run next to result equivalence. They look only at
//! query text and never touch the network.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::normalize::normalize_for_match;

/// Operators whose presence in the reference should carry over to the
/// translation.
static KEY_OPERATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bsummarize\b",
        r"\bwhere\b",
        r"\bextend\b",
        r"\bproject\b",
        r"\border by\b",
        r"\btake\b",
        r"\bjoin\b",
        r"\bunion\b",
        r"\bmv-expand\b",
        r"\bparse\b",
        r"\bextract\b",
        r"\bcount\(\)",
        r"\bcountif\b",
        r"\bdcount\b",
        r"\bbin\b",
        r"\btop\b",
        r"\barg_max\b",
        r"\barg_min\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("operator pattern is valid"))
    .collect()
});

static QUOTED_DATASET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\['([^']+)'\]").expect("dataset pattern is valid"));

/// 1 when both queries normalize to the same text.
pub fn exact_match(output: &str, expected: &str) -> f64 {
    if normalize_for_match(output) == normalize_for_match(expected) {
        1.0
    } else {
        0.0
    }
}

/// Share of the reference's key operators that the output also uses.
pub fn key_operators_present(output: &str, expected: &str) -> f64 {
    let expected = expected.to_lowercase();
    let output = output.to_lowercase();

    let (found, wanted) = KEY_OPERATORS
        .iter()
        .filter(|op| op.is_match(&expected))
        .fold((0usize, 0usize), |(found, wanted), op| {
            (found + usize::from(op.is_match(&output)), wanted + 1)
        });

    if wanted == 0 {
        1.0
    } else {
        found as f64 / wanted as f64
    }
}

/// 1 when the output reads the reference's `['dataset']`.
pub fn dataset_correct(output: &str, expected: &str) -> f64 {
    let Some(dataset) = QUOTED_DATASET
        .captures(expected)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    else {
        return 1.0;
    };

    if output.contains(&format!("['{}']", dataset)) {
        1.0
    } else {
        0.0
    }
}

/// 1 unless the reference is time-bounded and the output is not.
pub fn time_filter_present(output: &str, expected: &str) -> f64 {
    let expects_filter = expected.contains("_time between") || expected.contains("ago(");
    if !expects_filter {
        return 1.0;
    }

    let has_filter = output.contains("_time between")
        || output.contains("ago(")
        || output.contains("_time >=");
    if has_filter { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextScores {
    pub exact_match: f64,
    pub key_operators: f64,
    pub dataset_correct: f64,
    pub time_filter_present: f64,
}

impl TextScores {
    pub fn score_all(output: &str, expected: &str) -> Self {
        Self {
            exact_match: exact_match(output, expected),
            key_operators: key_operators_present(output, expected),
            dataset_correct: dataset_correct(output, expected),
            time_filter_present: time_filter_present(output, expected),
        }
    }
}
