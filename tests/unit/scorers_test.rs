use aplcheck::scorers::{
    dataset_correct, exact_match, key_operators_present, time_filter_present, TextScores,
};

#[test]
fn test_exact_match_ignores_fences_and_spacing() {
    let expected = "['logs'] | where status == 500 | count";
    assert_eq!(exact_match("```apl\n['logs']\n| where status == 500\n| count\n```", expected), 1.0);
    assert_eq!(exact_match("[\"logs\"] | where status == 500 | count", expected), 1.0);
    assert_eq!(exact_match("['logs'] | where status == 404 | count", expected), 0.0);
}

#[test]
fn test_key_operators_fraction() {
    let expected = "['logs'] | where status == 500 | summarize count() by bin(_time, 1h)";
    // where, summarize, count(), bin
    assert_eq!(key_operators_present(expected, expected), 1.0);
    assert_eq!(key_operators_present("['logs'] | where status == 500 | take 10", expected), 0.25);
    assert_eq!(key_operators_present("['logs']", expected), 0.0);
}

#[test]
fn test_key_operators_case_insensitive() {
    assert_eq!(key_operators_present("['x'] | WHERE a == 1", "['x'] | where a == 1"), 1.0);
}

#[test]
fn test_key_operators_without_any_in_reference() {
    assert_eq!(key_operators_present("anything", "['logs']"), 1.0);
}

#[test]
fn test_dataset_correct() {
    let expected = "['sample-http-logs'] | count";
    assert_eq!(dataset_correct("['sample-http-logs'] | take 1", expected), 1.0);
    assert_eq!(dataset_correct("['other'] | count", expected), 0.0);
    assert_eq!(dataset_correct("anything", "print 1"), 1.0);
}

#[test]
fn test_time_filter_present() {
    let bounded = "['x'] | where _time between (ago(1h) .. now())";
    assert_eq!(time_filter_present("['x'] | where _time >= ago(1h)", bounded), 1.0);
    assert_eq!(time_filter_present("['x'] | count", bounded), 0.0);
    assert_eq!(time_filter_present("['x'] | count", "['x'] | count"), 1.0);
}

#[test]
fn test_score_all() {
    let expected = "['logs'] | where _time > ago(1h) | count";
    let scores = TextScores::score_all("['logs'] | count", expected);
    assert_eq!(scores.exact_match, 0.0);
    assert_eq!(scores.key_operators, 0.0);
    assert_eq!(scores.dataset_correct, 1.0);
    assert_eq!(scores.time_filter_present, 0.0);
}
