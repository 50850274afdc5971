use aplcheck::backend::{Backend, ExecuteOptions, QueryResult};
use aplcheck::cli::WindowArgs;
use aplcheck::compare::MatchTier;
use aplcheck::evaluate::{parse_span, parse_timestamp, with_deadline, Evaluator, TimeWindow};
use aplcheck::time_filter::DEFAULT_TIME_RANGE;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Backend with canned results per query text. Unknown queries fail.
#[derive(Default)]
struct ScriptedBackend {
    results: HashMap<String, QueryResult>,
    delay: Option<Duration>,
    seen: Mutex<Vec<(String, ExecuteOptions)>>,
}

impl ScriptedBackend {
    fn with(mut self, apl: &str, result: QueryResult) -> Self {
        self.results.insert(apl.to_string(), result);
        self
    }

    fn seen(&self) -> Vec<(String, ExecuteOptions)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn execute(&self, apl: &str, opts: &ExecuteOptions) -> QueryResult {
        self.seen
            .lock()
            .unwrap()
            .push((apl.to_string(), opts.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .get(apl)
            .cloned()
            .unwrap_or_else(|| QueryResult::failure("HTTP 400: unknown query", Some(1)))
    }
}

fn counts(values: &[i64]) -> QueryResult {
    QueryResult::success(
        vec!["count_".to_string()],
        vec![values.iter().map(|v| json!(v)).collect()],
        Some(7),
    )
}

const REFERENCE: &str = "['logs'] | where _time > ago(1h) | summarize count()";

// --- Evaluator ---

#[tokio::test]
async fn test_fenced_candidate_is_extracted_and_matches() {
    let backend = ScriptedBackend::default()
        .with(REFERENCE, counts(&[42]))
        .with("['logs'] | summarize count()", counts(&[42]));
    let evaluator = Evaluator::new(backend);

    let evaluation = evaluator
        .evaluate(REFERENCE, "```apl\n['logs'] | summarize count()\n```")
        .await;

    assert_eq!(evaluation.candidate_query, "['logs'] | summarize count()");
    assert_eq!(evaluation.outcome.score, 1.0);
    assert_eq!(evaluation.outcome.tier, MatchTier::Exact);
    assert_eq!(evaluation.expected_bound.unwrap().start, "ago(1h)");
    assert_eq!(evaluation.candidate_bound, None);
    assert_eq!(evaluation.text.dataset_correct, 1.0);
    assert_eq!(evaluation.text.time_filter_present, 0.0);
}

#[tokio::test]
async fn test_both_queries_share_one_window() {
    let backend = ScriptedBackend::default()
        .with(REFERENCE, counts(&[1]))
        .with("['logs'] | count", counts(&[1]));
    let evaluator = Evaluator::new(backend).with_window(TimeWindow::Last(Duration::from_secs(3600)));

    evaluator.evaluate(REFERENCE, "['logs'] | count").await;

    let seen = evaluator.backend().seen();
    assert_eq!(seen.len(), 2);
    let (_, first) = &seen[0];
    let (_, second) = &seen[1];
    assert_eq!(first, second);
    let start = first.start_time.unwrap();
    let end = first.end_time.unwrap();
    assert_eq!(end - start, chrono::Duration::hours(1));
}

#[tokio::test]
async fn test_default_window_is_bounded() {
    let evaluator = Evaluator::new(ScriptedBackend::default());

    evaluator.evaluate(REFERENCE, "['logs'] | count").await;

    let seen = evaluator.backend().seen();
    assert_eq!(seen.len(), 2);
    for (_, opts) in seen {
        assert_eq!(opts, ExecuteOptions::inline(DEFAULT_TIME_RANGE));
    }
}

#[tokio::test]
async fn test_reference_and_candidate_run_concurrently() {
    let delay = Duration::from_millis(300);
    let backend = ScriptedBackend {
        delay: Some(delay),
        ..ScriptedBackend::default()
    }
    .with(REFERENCE, counts(&[1]))
    .with("['logs'] | count", counts(&[1]));
    let evaluator = Evaluator::new(backend);

    let started = Instant::now();
    let evaluation = evaluator.evaluate(REFERENCE, "['logs'] | count").await;
    let elapsed = started.elapsed();

    assert_eq!(evaluation.outcome.score, 1.0);
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "executions were serialized: {:?}", elapsed);
}

#[tokio::test]
async fn test_inline_window_is_passed_through() {
    let backend = ScriptedBackend::default();
    let evaluator =
        Evaluator::new(backend).with_window(TimeWindow::Inline("ago(1d) .. now()".to_string()));

    evaluator.evaluate(REFERENCE, "['logs'] | count").await;

    for (_, opts) in evaluator.backend().seen() {
        assert_eq!(opts, ExecuteOptions::inline("ago(1d) .. now()"));
    }
}

#[tokio::test]
async fn test_candidate_failure_scores_zero() {
    let backend = ScriptedBackend::default().with(REFERENCE, counts(&[3]));
    let evaluator = Evaluator::new(backend);

    let evaluation = evaluator.evaluate(REFERENCE, "['logs'] | sumarize count()").await;

    assert_eq!(evaluation.outcome.score, 0.0);
    assert_eq!(
        evaluation.outcome.reason,
        "generated query failed: HTTP 400: unknown query"
    );
    assert!(evaluation.expected.success);
    assert!(!evaluation.actual.success);
}

#[tokio::test]
async fn test_deadline_turns_slow_queries_into_failures() {
    let backend = ScriptedBackend {
        delay: Some(Duration::from_secs(5)),
        ..ScriptedBackend::default()
    };
    let evaluator = Evaluator::new(backend).with_deadline(Duration::from_millis(20));

    let evaluation = evaluator.evaluate(REFERENCE, "['logs'] | count").await;

    assert_eq!(evaluation.outcome.tier, MatchTier::ExecutionFailed);
    assert_eq!(
        evaluation.expected.error.as_deref(),
        Some("timeout: query cancelled after 20ms")
    );
    assert_eq!(evaluation.expected.elapsed_ms, Some(20));
}

// --- with_deadline ---

#[tokio::test]
async fn test_with_deadline_passes_fast_results_through() {
    let result = with_deadline(async { counts(&[1, 2]) }, Duration::from_secs(1)).await;
    assert!(result.success);
    assert_eq!(result.row_count, 2);
}

#[tokio::test]
async fn test_with_deadline_expires() {
    let slow = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        counts(&[1])
    };
    let result = with_deadline(slow, Duration::from_millis(10)).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("timeout: query cancelled after 10ms"));
}

// --- TimeWindow ---

#[test]
fn test_window_resolution() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert_eq!(TimeWindow::Unbounded.resolve(now), ExecuteOptions::default());

    let last = TimeWindow::Last(Duration::from_secs(1800)).resolve(now);
    assert_eq!(last.start_time, Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap()));
    assert_eq!(last.end_time, Some(now));

    let explicit = TimeWindow::Explicit { start: Some(now), end: None }.resolve(now);
    assert_eq!(explicit.start_time, Some(now));
    assert_eq!(explicit.end_time, None);
    assert!(explicit.has_explicit_bounds());
}

// --- Window flags ---

#[test]
fn test_no_window_flags_fall_back_to_range() {
    let window = WindowArgs::default().time_window("ago(30m) .. now()").unwrap();
    assert_eq!(window, TimeWindow::Inline("ago(30m) .. now()".to_string()));
}

#[test]
fn test_window_flags_select_window() {
    let args = WindowArgs {
        last: Some("2h".to_string()),
        ..WindowArgs::default()
    };
    assert_eq!(
        args.time_window(DEFAULT_TIME_RANGE).unwrap(),
        TimeWindow::Last(Duration::from_secs(7200))
    );

    let args = WindowArgs {
        start: Some("2024-05-01T12:00:00Z".to_string()),
        ..WindowArgs::default()
    };
    assert_eq!(
        args.time_window(DEFAULT_TIME_RANGE).unwrap(),
        TimeWindow::Explicit {
            start: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            end: None,
        }
    );

    let args = WindowArgs {
        no_time_range: true,
        ..WindowArgs::default()
    };
    assert_eq!(args.time_window(DEFAULT_TIME_RANGE).unwrap(), TimeWindow::Unbounded);
}

#[test]
fn test_window_flags_reject_bad_values() {
    let args = WindowArgs {
        end: Some("soon".to_string()),
        ..WindowArgs::default()
    };
    assert!(args.time_window(DEFAULT_TIME_RANGE).is_err());
}

// --- Parsing ---

#[test]
fn test_parse_span() {
    assert_eq!(parse_span("45s").unwrap(), Duration::from_secs(45));
    assert_eq!(parse_span("30m").unwrap(), Duration::from_secs(1800));
    assert_eq!(parse_span("1h").unwrap(), Duration::from_secs(3600));
    assert_eq!(parse_span(" 7d ").unwrap(), Duration::from_secs(7 * 86_400));
}

#[test]
fn test_parse_span_rejects_garbage() {
    for text in ["", "h", "10", "5w", "-1h", "1.5h"] {
        let err = parse_span(text).unwrap_err();
        assert!(err.to_string().starts_with("config: invalid time span"), "{}", err);
    }
}

#[test]
fn test_parse_timestamp() {
    assert_eq!(
        parse_timestamp("2024-05-01T14:00:00+02:00").unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    );
    assert!(parse_timestamp("yesterday").is_err());
}
