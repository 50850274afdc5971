pub mod axiom;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Outcome of executing one query. Failures are carried as data: `success`
/// is false, `error` says why, and no columns or rows are present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Columnar cells: `data[c][r]` is row `r` of column `c`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vec<serde_json::Value>>>,
}

impl QueryResult {
    /// A successful result. The row count is taken from the first column.
    pub fn success(
        columns: Vec<String>,
        data: Vec<Vec<serde_json::Value>>,
        elapsed_ms: Option<u64>,
    ) -> Self {
        let row_count = data.first().map_or(0, Vec::len);
        Self {
            success: true,
            row_count,
            error: None,
            elapsed_ms,
            columns: Some(columns),
            data: Some(data),
        }
    }

    pub fn failure(error: impl Into<String>, elapsed_ms: Option<u64>) -> Self {
        Self {
            success: false,
            row_count: 0,
            error: Some(error.into()),
            elapsed_ms,
            columns: None,
            data: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.columns.as_deref().unwrap_or_default()
    }

    pub fn data(&self) -> &[Vec<serde_json::Value>] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Position of the first column whose name matches one of `candidates`,
    /// ignoring ASCII case. Earlier candidates win.
    pub fn column_index(&self, candidates: &[&str]) -> Option<usize> {
        let columns = self.columns();
        candidates.iter().find_map(|wanted| {
            columns
                .iter()
                .position(|name| name.eq_ignore_ascii_case(wanted))
        })
    }
}

/// Time scoping for a single execution.
///
/// Explicit bounds travel as request parameters. `inline_range` is the
/// textual fallback: an APL range expression such as `ago(1h) .. now()`
/// rewritten into the query itself, used only when no explicit bound is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub inline_range: Option<String>,
}

impl ExecuteOptions {
    pub fn window(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            end_time: Some(end_time),
            inline_range: None,
        }
    }

    pub fn inline(range: impl Into<String>) -> Self {
        Self {
            inline_range: Some(range.into()),
            ..Self::default()
        }
    }

    pub fn has_explicit_bounds(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

/// ISO 8601 form sent on the wire, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Anything that can run an APL query and hand back a tabular result.
pub trait Backend {
    fn execute(
        &self,
        apl: &str,
        opts: &ExecuteOptions,
    ) -> impl std::future::Future<Output = QueryResult> + Send;
}
