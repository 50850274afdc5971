use std::sync::LazyLock;

use regex::Regex;

/// A single fenced block spanning the whole (trimmed) text, with an optional
/// language tag such as ```` ```apl ```` or ```` ```kusto ````.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```\w*[ \t\r]*\n(.*?)\n```\s*\z").expect("fence pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static DOUBLE_QUOTED_DATASET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\["([^"]+)"\]"#).expect("dataset pattern is valid")
});

/// Recover a bare query from raw model output.
///
/// Output wrapped in a single code fence yields the fenced content; anything
/// else comes back trimmed but otherwise untouched.
pub fn extract_query(raw_output: &str) -> String {
    let trimmed = raw_output.trim();

    if let Some(inner) = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        && !inner.is_empty()
    {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}

/// Canonical text form used for exact-match scoring: fences removed,
/// whitespace runs collapsed, `["ds"]` rewritten to `['ds']`.
pub fn normalize_for_match(query: &str) -> String {
    let query = extract_query(query);
    let collapsed = WHITESPACE_RUN.replace_all(&query, " ");
    DOUBLE_QUOTED_DATASET
        .replace_all(&collapsed, "['$1']")
        .trim()
        .to_string()
}
