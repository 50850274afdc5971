use aplcheck::normalize::{extract_query, normalize_for_match};

#[test]
fn test_fenced_with_language_tag() {
    assert_eq!(extract_query("```apl\nfoo | bar\n```"), "foo | bar");
}

#[test]
fn test_fenced_without_language_tag() {
    assert_eq!(extract_query("```\n['logs'] | take 5\n```"), "['logs'] | take 5");
}

#[test]
fn test_fenced_multiline_content_trimmed() {
    let raw = "\n  ```kusto\n  ['logs']\n| summarize count() by status  \n```\n\n";
    assert_eq!(extract_query(raw), "['logs']\n| summarize count() by status");
}

#[test]
fn test_bare_query_is_trimmed_only() {
    assert_eq!(extract_query("   ['logs'] | count  \n"), "['logs'] | count");
}

#[test]
fn test_text_around_fence_is_not_stripped() {
    let raw = "Here is the query:\n```apl\nfoo\n```";
    assert_eq!(extract_query(raw), raw);
}

#[test]
fn test_fence_must_close_at_end_of_text() {
    // The closing fence is the last one; inner fences stay in the content.
    let raw = "```apl\nfoo\n```\n```apl\nbar\n```";
    assert_eq!(extract_query(raw), "foo\n```\n```apl\nbar");
}

#[test]
fn test_normalize_collapses_whitespace_and_quotes() {
    let a = "```apl\n[\"sample-http-logs\"]\n|   where status == 500\n```";
    let b = "['sample-http-logs'] | where status == 500";
    assert_eq!(normalize_for_match(a), normalize_for_match(b));
    assert_eq!(normalize_for_match(b), b);
}
