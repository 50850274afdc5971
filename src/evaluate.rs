//! Reference-vs-candidate evaluation.
//!
//! Both queries run concurrently over one resolved time window, so they see
//! byte-identical bounds even when the window is relative to "now".

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::backend::{Backend, ExecuteOptions, QueryResult};
use crate::compare::{compare, ComparisonOutcome};
use crate::error::AplcheckError;
use crate::normalize::extract_query;
use crate::scorers::TextScores;
use crate::time_filter::{extract_time_expression, TimeExpression, DEFAULT_TIME_RANGE};

/// How executions are scoped in time. Defaults to the inline range
/// `ago(1h) .. now()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// No bounds; the service default applies.
    Unbounded,
    Explicit {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    /// `[now - d, now]`, resolved once per evaluation.
    Last(Duration),
    /// Textual range injected into both queries, e.g. `ago(1h) .. now()`.
    Inline(String),
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Inline(DEFAULT_TIME_RANGE.to_string())
    }
}

impl TimeWindow {
    pub fn resolve(&self, now: DateTime<Utc>) -> ExecuteOptions {
        match self {
            TimeWindow::Unbounded => ExecuteOptions::default(),
            TimeWindow::Explicit { start, end } => ExecuteOptions {
                start_time: *start,
                end_time: *end,
                inline_range: None,
            },
            TimeWindow::Last(span) => {
                let span = chrono::Duration::from_std(*span).unwrap_or(chrono::Duration::MAX);
                let start = now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC);
                ExecuteOptions::window(start, now)
            }
            TimeWindow::Inline(range) => ExecuteOptions::inline(range.clone()),
        }
    }
}

/// Parse a relative span such as `45s`, `30m`, `1h` or `7d`.
pub fn parse_span(text: &str) -> Result<Duration, AplcheckError> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);

    let invalid = || AplcheckError::Config {
        message: format!("invalid time span '{}' (expected e.g. 30m, 1h, 7d)", text),
    };

    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let seconds_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, AplcheckError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AplcheckError::Config {
            message: format!("invalid timestamp '{}': {}", text, e),
        })
}

/// Await a query under a deadline. On expiry the in-flight future is dropped,
/// which aborts its network call, and a failed result is returned instead.
pub async fn with_deadline<F>(query: F, deadline: Duration) -> QueryResult
where
    F: Future<Output = QueryResult>,
{
    match tokio::time::timeout(deadline, query).await {
        Ok(result) => result,
        Err(_) => {
            let millis = deadline.as_millis();
            QueryResult::failure(
                AplcheckError::Timeout { millis }.to_string(),
                Some(millis as u64),
            )
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub outcome: ComparisonOutcome,
    pub text: TextScores,
    /// Candidate query after fence removal.
    pub candidate_query: String,
    /// Time bound written in the reference text, if any.
    #[serde(skip)]
    pub expected_bound: Option<TimeExpression>,
    /// Time bound written in the candidate text, if any.
    #[serde(skip)]
    pub candidate_bound: Option<TimeExpression>,
    pub expected: QueryResult,
    pub actual: QueryResult,
}

pub struct Evaluator<B> {
    backend: B,
    window: TimeWindow,
    deadline: Option<Duration>,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            window: TimeWindow::default(),
            deadline: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Per-query deadline applied around each execution.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn run(&self, apl: &str, opts: &ExecuteOptions) -> QueryResult {
        match self.deadline {
            Some(deadline) => with_deadline(self.backend.execute(apl, opts), deadline).await,
            None => self.backend.execute(apl, opts).await,
        }
    }

    /// Execute the reference and the candidate (raw model output) and grade
    /// the candidate.
    pub async fn evaluate(&self, expected_apl: &str, raw_output: &str) -> Evaluation {
        let candidate_query = extract_query(raw_output);
        let opts = self.window.resolve(Utc::now());

        let (expected, actual) = tokio::join!(
            self.run(expected_apl, &opts),
            self.run(&candidate_query, &opts)
        );

        let outcome = compare(&expected, &actual);
        debug!(score = outcome.score, tier = %outcome.tier, "evaluation complete");

        Evaluation {
            text: TextScores::score_all(&candidate_query, expected_apl),
            expected_bound: extract_time_expression(expected_apl),
            candidate_bound: extract_time_expression(&candidate_query),
            candidate_query,
            outcome,
            expected,
            actual,
        }
    }
}
