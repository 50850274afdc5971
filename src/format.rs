use crate::backend::QueryResult;
use crate::error::AplcheckError;
use crate::evaluate::Evaluation;

/// Row-major view of a columnar result: one JSON object per row.
pub fn to_rows(result: &QueryResult) -> Vec<serde_json::Value> {
    let columns = result.columns();
    let data = result.data();

    (0..result.row_count)
        .map(|row| {
            let mut map = serde_json::Map::new();
            for (i, name) in columns.iter().enumerate() {
                let value = data
                    .get(i)
                    .and_then(|cells| cells.get(row))
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                map.insert(name.clone(), value);
            }
            serde_json::Value::Object(map)
        })
        .collect()
}

/// Convert a QueryResult to a TOON-formatted string. Failed results render
/// as an `error` object.
pub fn to_toon(result: &QueryResult) -> Result<String, AplcheckError> {
    if !result.success {
        let mut map = serde_json::Map::new();
        map.insert("success".to_string(), serde_json::Value::Bool(false));
        map.insert(
            "error".to_string(),
            serde_json::Value::String(result.error.clone().unwrap_or_default()),
        );
        return encode(&serde_json::Value::Object(map));
    }

    // toon_format can't infer columns from an empty array, so the header for
    // zero-row results is written by hand.
    if result.row_count == 0 && !result.columns().is_empty() {
        return Ok(format!("[0]{{{}}}:\n", result.columns().join(",")));
    }

    encode(&serde_json::Value::Array(to_rows(result)))
}

/// Score summary of an evaluation, without the raw result tables.
pub fn evaluation_to_toon(evaluation: &Evaluation) -> Result<String, AplcheckError> {
    let summary = serde_json::json!({
        "score": evaluation.outcome.score,
        "tier": evaluation.outcome.tier,
        "reason": evaluation.outcome.reason,
        "expected_rows": evaluation.expected.row_count,
        "actual_rows": evaluation.actual.row_count,
        "candidate_query": evaluation.candidate_query,
        "text_scores": evaluation.text,
    });
    encode(&summary)
}

fn encode(value: &serde_json::Value) -> Result<String, AplcheckError> {
    toon_format::encode_default(value).map_err(|e| AplcheckError::Format {
        message: e.to_string(),
    })
}
