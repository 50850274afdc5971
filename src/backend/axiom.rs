use crate::backend::{format_timestamp, Backend, ExecuteOptions, QueryResult};
use crate::config::AxiomConfig;
use crate::error::AplcheckError;
use crate::time_filter::{inject_time_range, strip_time_filter};
use crate::verbose::Timer;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reported when no URL/token pair is configured.
pub const MISSING_CONFIG_MESSAGE: &str = "AXIOM_PLAY_URL and AXIOM_PLAY_TOKEN not configured";

const ORG_ID_HEADER: &str = "X-Axiom-Org-Id";

pub struct AxiomBackend {
    config: Option<AxiomConfig>,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AplRequest<'a> {
    apl: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
}

#[derive(Deserialize)]
struct TabularResponse {
    tables: Option<Vec<Table>>,
}

#[derive(Deserialize)]
struct Table {
    fields: Option<Vec<FieldInfo>>,
    columns: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Deserialize)]
struct FieldInfo {
    #[serde(default)]
    name: String,
}

impl TabularResponse {
    /// Column names and columnar cells of the first table. Missing pieces
    /// come back empty.
    fn into_first_table(self) -> (Vec<String>, Vec<Vec<serde_json::Value>>) {
        let Some(table) = self.tables.and_then(|tables| tables.into_iter().next()) else {
            return (Vec::new(), Vec::new());
        };
        let columns = table
            .fields
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.name)
            .collect();
        (columns, table.columns.unwrap_or_default())
    }
}

impl AxiomBackend {
    pub fn new(config: Option<AxiomConfig>) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    async fn send(
        &self,
        config: &AxiomConfig,
        apl: &str,
        opts: &ExecuteOptions,
    ) -> Result<(Vec<String>, Vec<Vec<serde_json::Value>>), AplcheckError> {
        let url = format!(
            "{}/v1/datasets/_apl?format=tabular",
            config.url.trim_end_matches('/')
        );

        let body = AplRequest {
            apl,
            start_time: opts.start_time.as_ref().map(format_timestamp),
            end_time: opts.end_time.as_ref().map(format_timestamp),
        };

        let mut request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", config.token.expose_secret()))
            .json(&body);
        if let Some(org_id) = &config.org_id {
            request = request.header(ORG_ID_HEADER, org_id);
        }

        let resp = request.send().await.map_err(|e| AplcheckError::Connection {
            message: format!("failed to execute query: {}", e),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.map_err(|e| AplcheckError::Connection {
                message: format!("failed to read error body: {}", e),
            })?;
            return Err(AplcheckError::Remote {
                status: status.as_u16(),
                message: remote_error_message(&text),
            });
        }

        let response: TabularResponse = resp.json().await.map_err(|e| AplcheckError::Response {
            message: format!("failed to parse response: {}", e),
        })?;

        Ok(response.into_first_table())
    }
}

/// The `message` field of a JSON error body, or the raw body.
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string())
}

/// The query text actually sent: embedded time filters are always removed;
/// an inline range is written back only when no explicit bound is set.
pub fn prepare_query(apl: &str, opts: &ExecuteOptions) -> String {
    match &opts.inline_range {
        Some(range) if !opts.has_explicit_bounds() => inject_time_range(apl, range),
        _ => strip_time_filter(apl),
    }
}

impl Backend for AxiomBackend {
    async fn execute(&self, apl: &str, opts: &ExecuteOptions) -> QueryResult {
        let Some(config) = &self.config else {
            return QueryResult::failure(MISSING_CONFIG_MESSAGE, None);
        };

        let query = prepare_query(apl, opts);
        debug!(
            query = %query.replace('\n', " "),
            start = ?opts.start_time,
            end = ?opts.end_time,
            "executing APL query"
        );

        let timer = Timer::start();
        match self.send(config, &query, opts).await {
            Ok((columns, data)) => {
                let result = QueryResult::success(columns, data, Some(timer.elapsed_ms()));
                debug!(
                    rows = result.row_count,
                    columns = result.columns().len(),
                    elapsed_ms = timer.elapsed_ms(),
                    "query complete"
                );
                result
            }
            Err(err @ AplcheckError::Remote { .. }) => {
                warn!(error = %err, elapsed_ms = timer.elapsed_ms(), "query rejected");
                QueryResult::failure(err.to_string(), Some(timer.elapsed_ms()))
            }
            Err(err) => {
                warn!(error = %err, "query transport failed");
                QueryResult::failure(err.to_string(), None)
            }
        }
    }
}
