//! Time-bound predicate detection and rewriting.
//!
//! Queries are split into top-level pipe segments by a small lexer that skips
//! string literals, `//` comments and bracketed groups. Each segment is then
//! classified by its leading keyword; `where` segments are checked for one of
//! three bound shapes on the time field:
//!
//! - `_time between (<start> .. <end>)`
//! - `_time >= <expr>`
//! - `_time > <expr>`

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Column holding the event timestamp.
pub const TIME_FIELD: &str = "_time";

/// Range injected when the caller does not supply one.
pub const DEFAULT_TIME_RANGE: &str = "ago(1h) .. now()";

/// Upper bound reported for lower-bound-only predicates.
pub const NOW_SENTINEL: &str = "now()";

/// Leading words that start a statement or a tabular operator rather than
/// name a dataset.
const STATEMENT_KEYWORDS: &[&str] = &[
    "let", "union", "print", "datatable", "range", "search", "find", "set", "declare",
    "where", "filter", "summarize", "project", "project-away", "project-keep", "extend",
    "take", "limit", "count", "sort", "order", "top", "distinct", "join", "lookup", "parse",
    "mv-expand", "make-series", "getschema",
];

static DATASET_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\A\s*\[(?:'[^']+'|"[^"]+")\]"#).expect("dataset literal pattern is valid")
});

static BARE_DATASET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*([A-Za-z_][A-Za-z0-9_\-]*)(?:\s|\||\z)")
        .expect("bare dataset pattern is valid")
});

/// A time bound found in query text. `start` and `end` are unevaluated APL
/// expressions; `raw` is the exact matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeExpression {
    pub start: String,
    pub end: String,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundShape {
    Between,
    AtLeast,
    After,
}

const SHAPES_BY_PRIORITY: [BoundShape; 3] =
    [BoundShape::Between, BoundShape::AtLeast, BoundShape::After];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    /// `where` whose whole predicate is a time bound.
    TimeFilter,
    /// `where` mixing a time bound with other conditions.
    CombinedTimeFilter,
    Other,
}

/// A character outside string literals and comments, with the bracket depth
/// in effect just before it.
#[derive(Debug, Clone, Copy)]
struct CodeChar {
    pos: usize,
    ch: char,
    depth: usize,
}

fn code_chars(text: &str) -> Vec<CodeChar> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '"' | '\'' => {
                // Quotes are kept so a literal still counts as code; its
                // contents are skipped.
                out.push(CodeChar { pos, ch, depth });
                let verbatim = text[..pos].ends_with('@');
                let mut escaped = false;
                for (p, c) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' && !verbatim {
                        escaped = true;
                    } else if c == ch {
                        out.push(CodeChar { pos: p, ch: c, depth });
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => {
                out.push(CodeChar { pos, ch, depth });
                depth += 1;
            }
            ')' | ']' | '}' => {
                out.push(CodeChar { pos, ch, depth });
                depth = depth.saturating_sub(1);
            }
            _ => out.push(CodeChar { pos, ch, depth }),
        }
    }

    out
}

/// Split at pipes that are not nested in brackets, strings or comments.
/// Segment text keeps its surrounding whitespace.
fn split_segments(query: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for c in code_chars(query) {
        if c.ch == '|' && c.depth == 0 {
            segments.push(&query[start..c.pos]);
            start = c.pos + 1;
        }
    }
    segments.push(&query[start..]);
    segments
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn preceded_by_ident(text: &str, pos: usize) -> bool {
    text[..pos].chars().next_back().is_some_and(is_ident_char)
}

fn followed_by_ident(text: &str, pos: usize) -> bool {
    text[pos..].chars().next().is_some_and(is_ident_char)
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

fn time_field_positions(segment: &str) -> Vec<usize> {
    code_chars(segment)
        .into_iter()
        .filter(|c| {
            c.ch == '_'
                && segment[c.pos..].starts_with(TIME_FIELD)
                && !preceded_by_ident(segment, c.pos)
                && !followed_by_ident(segment, c.pos + TIME_FIELD.len())
        })
        .map(|c| c.pos)
        .collect()
}

/// Inside `( ... )`: offsets of the first top-level `..` and of the closing
/// parenthesis, relative to `body`.
fn scan_range_body(body: &str) -> Option<(usize, usize)> {
    let code = code_chars(body);
    let close = code.iter().find(|c| c.ch == ')' && c.depth == 0)?.pos;
    let dots = code
        .windows(2)
        .find(|w| {
            w[0].depth == 0 && w[0].ch == '.' && w[1].ch == '.' && w[1].pos == w[0].pos + 1
        })
        .map(|w| w[0].pos)
        .filter(|&dots| dots < close)?;
    Some((dots, close))
}

/// Length of a comparison operand: it runs to a top-level pipe, an
/// unmatched closing parenthesis, or the end of the text, and ends at the
/// last code character before that point (trailing comments excluded).
fn scan_operand(text: &str) -> usize {
    let mut end = 0;
    for c in code_chars(text) {
        if c.depth == 0 && (c.ch == '|' || c.ch == ')') {
            break;
        }
        if !c.ch.is_whitespace() {
            end = c.pos + c.ch.len_utf8();
        }
    }
    end
}

fn match_bound(segment: &str, field_pos: usize, shape: BoundShape) -> Option<TimeExpression> {
    let op = skip_whitespace(segment, field_pos + TIME_FIELD.len());
    let tail = &segment[op..];

    match shape {
        BoundShape::Between => {
            const KEYWORD: &str = "between";
            if !tail.starts_with(KEYWORD) || followed_by_ident(segment, op + KEYWORD.len()) {
                return None;
            }
            let paren = skip_whitespace(segment, op + KEYWORD.len());
            if !segment[paren..].starts_with('(') {
                return None;
            }
            let body_start = paren + 1;
            let (dots, close) = scan_range_body(&segment[body_start..])?;
            let start = segment[body_start..body_start + dots].trim();
            let end = segment[body_start + dots + 2..body_start + close].trim();
            if start.is_empty() || end.is_empty() {
                return None;
            }
            Some(TimeExpression {
                start: start.to_string(),
                end: end.to_string(),
                raw: segment[field_pos..=body_start + close].to_string(),
            })
        }
        BoundShape::AtLeast | BoundShape::After => {
            let operand_start = match shape {
                BoundShape::AtLeast if tail.starts_with(">=") => op + 2,
                BoundShape::After if tail.starts_with('>') && !tail.starts_with(">=") => op + 1,
                _ => return None,
            };
            let operand_len = scan_operand(&segment[operand_start..]);
            let operand = &segment[operand_start..operand_start + operand_len];
            if operand.trim().is_empty() {
                return None;
            }
            let raw_end = operand_start + operand.trim_end().len();
            Some(TimeExpression {
                start: operand.trim().to_string(),
                end: NOW_SENTINEL.to_string(),
                raw: segment[field_pos..raw_end].to_string(),
            })
        }
    }
}

fn find_bound(segment: &str, shape: BoundShape) -> Option<TimeExpression> {
    time_field_positions(segment)
        .into_iter()
        .find_map(|pos| match_bound(segment, pos, shape))
}

fn classify(segment: &str) -> SegmentKind {
    let body = segment.trim_start();
    let keyword_len = body
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    if &body[..keyword_len] != "where" {
        return SegmentKind::Other;
    }

    let predicate = body[keyword_len..].trim();
    let Some(bound) = SHAPES_BY_PRIORITY
        .into_iter()
        .find_map(|shape| find_bound(predicate, shape))
    else {
        return SegmentKind::Other;
    };

    let whole = predicate == bound.raw || predicate == format!("({})", bound.raw);
    if whole && !has_connective(&bound.raw) {
        SegmentKind::TimeFilter
    } else {
        SegmentKind::CombinedTimeFilter
    }
}

/// Whether a predicate joins conditions with `and`/`or` outside brackets.
fn has_connective(predicate: &str) -> bool {
    code_chars(predicate).into_iter().any(|c| {
        c.depth == 0
            && !preceded_by_ident(predicate, c.pos)
            && ["and", "or"].iter().any(|word| {
                predicate[c.pos..].starts_with(word)
                    && !followed_by_ident(predicate, c.pos + word.len())
            })
    })
}

/// Find the first time bound in `query`, trying `between`, then `>=`, then
/// `>`. `None` means the query carries no explicit time bound.
///
/// The operand of `>=` and `>` runs to the end of its pipe segment, so in
/// `_time >= ago(1h) and status == 500` the reported start is
/// `ago(1h) and status == 500`.
pub fn extract_time_expression(query: &str) -> Option<TimeExpression> {
    let segments = split_segments(query);
    SHAPES_BY_PRIORITY.into_iter().find_map(|shape| {
        segments
            .iter()
            .find_map(|segment| find_bound(segment, shape))
    })
}

/// Remove every `where` segment that bounds the time field.
///
/// A segment that mixes the time bound with other conditions is removed as
/// a whole, so those other conditions are lost.
pub fn strip_time_filter(query: &str) -> String {
    let mut removed = false;
    let kept: Vec<&str> = split_segments(query)
        .into_iter()
        .filter(|segment| match classify(segment) {
            SegmentKind::TimeFilter => {
                removed = true;
                false
            }
            SegmentKind::CombinedTimeFilter => {
                warn!(
                    segment = segment.trim(),
                    "removing time filter segment that also holds other conditions"
                );
                removed = true;
                false
            }
            SegmentKind::Other => true,
        })
        .collect();

    if !removed {
        return query.to_string();
    }
    kept.join("|").trim().to_string()
}

/// Byte offset just past the dataset reference heading `query`, if any.
fn dataset_reference_end(query: &str) -> Option<usize> {
    if let Some(m) = DATASET_LITERAL.find(query) {
        return Some(m.end());
    }
    let name = BARE_DATASET.captures(query)?.get(1)?;
    if STATEMENT_KEYWORDS.contains(&name.as_str()) {
        return None;
    }
    Some(name.end())
}

/// Replace any time filter in `query` with `where _time between (<range>)`
/// placed right after the dataset reference. Without a recognizable dataset
/// reference the query is only stripped.
pub fn inject_time_range(query: &str, time_range: &str) -> String {
    let stripped = strip_time_filter(query);
    match dataset_reference_end(&stripped) {
        Some(end) => format!(
            "{}\n| where {} between ({}){}",
            &stripped[..end],
            TIME_FIELD,
            time_range,
            &stripped[end..]
        ),
        None => stripped,
    }
}
