use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{Backend, ExecuteOptions, QueryResult};

const NAME_COLUMNS: &[&str] = &["ColumnName", "name", "column_name", "column"];
const TYPE_COLUMNS: &[&str] = &["ColumnType", "DataType", "type", "column_type"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Field names and types of a dataset, in the order the service returned them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DatasetSchema {
    pub fields: Vec<SchemaField>,
}

impl DatasetSchema {
    /// Build from a `getschema` result. `None` without recognizable name and
    /// type columns.
    pub fn from_result(result: &QueryResult) -> Option<Self> {
        if !result.success {
            return None;
        }
        let name_idx = result.column_index(NAME_COLUMNS)?;
        let type_idx = result.column_index(TYPE_COLUMNS)?;
        let data = result.data();
        let names = data.get(name_idx)?;
        let types = data.get(type_idx)?;

        let fields = names
            .iter()
            .zip(types)
            .map(|(name, field_type)| SchemaField {
                name: cell_text(name),
                field_type: cell_text(field_type),
            })
            .collect();
        Some(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// One `name: type` line per field.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.field_type))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Introspection query for a dataset.
pub fn schema_query(dataset: &str) -> String {
    format!("['{}'] | getschema", dataset)
}

/// Memoized dataset schemas, fetched through a [`Backend`] on first lookup.
///
/// Entries are never evicted. Failed lookups are not cached. Two concurrent
/// misses on the same dataset may both fetch; the second insert replaces an
/// identical value.
pub struct SchemaCache<B> {
    backend: B,
    entries: DashMap<String, Arc<DatasetSchema>>,
}

impl<B: Backend> SchemaCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: DashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn get_schema(&self, dataset: &str) -> Option<Arc<DatasetSchema>> {
        if let Some(hit) = self.entries.get(dataset) {
            return Some(Arc::clone(hit.value()));
        }

        let result = self
            .backend
            .execute(&schema_query(dataset), &ExecuteOptions::default())
            .await;

        let Some(schema) = DatasetSchema::from_result(&result) else {
            warn!(
                dataset,
                error = result.error.as_deref().unwrap_or("no name/type columns"),
                "schema lookup failed"
            );
            return None;
        };

        debug!(dataset, fields = schema.len(), "schema cached");
        let schema = Arc::new(schema);
        self.entries.insert(dataset.to_string(), Arc::clone(&schema));
        Some(schema)
    }

    pub fn cached(&self, dataset: &str) -> Option<Arc<DatasetSchema>> {
        self.entries.get(dataset).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
