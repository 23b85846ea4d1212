use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read-only document store the `store_*` tools query. Filters and
/// pipelines arrive as already-parsed JSON; interpretation is up to the
/// backend.
#[async_trait]
pub trait DocStoreBackend: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError>;

    async fn find_one(&self, collection: &str, filter: Value)
        -> Result<Option<Value>, BackendError>;

    async fn count(&self, collection: &str, filter: Value) -> Result<u64, BackendError>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError>;

    async fn list_collections(&self) -> Result<Vec<String>, BackendError>;
}

/// In-memory backend for tests and demos. Filters match documents whose
/// top-level fields equal every filter field (empty filter matches all);
/// pipelines support `$match`, `$limit` and `$count` stages.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<BTreeMap<String, Vec<Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, document: Value) {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    fn filtered(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, BackendError> {
        let filter = as_filter_object(filter)?;
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn as_filter_object(filter: &Value) -> Result<serde_json::Map<String, Value>, BackendError> {
    match filter {
        Value::Object(obj) => Ok(obj.clone()),
        Value::Null => Ok(serde_json::Map::new()),
        other => Err(BackendError::Query(format!(
            "filter must be an object, got {other}"
        ))),
    }
}

fn matches_filter(doc: &Value, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

#[async_trait]
impl DocStoreBackend for MemoryBackend {
    async fn find(
        &self,
        collection: &str,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError> {
        let mut docs = self.filtered(collection, &filter)?;
        docs.truncate(limit);
        Ok(docs)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<Value>, BackendError> {
        Ok(self.filtered(collection, &filter)?.into_iter().next())
    }

    async fn count(&self, collection: &str, filter: Value) -> Result<u64, BackendError> {
        Ok(self.filtered(collection, &filter)?.len() as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut docs = self.filtered(collection, &Value::Null)?;
        for stage in &pipeline {
            let stage = stage
                .as_object()
                .ok_or_else(|| BackendError::Query(format!("pipeline stage must be an object, got {stage}")))?;
            let (op, spec) = stage
                .iter()
                .next()
                .ok_or_else(|| BackendError::Query("empty pipeline stage".to_string()))?;
            match op.as_str() {
                "$match" => {
                    let filter = as_filter_object(spec)?;
                    docs.retain(|doc| matches_filter(doc, &filter));
                }
                "$limit" => {
                    let limit = spec
                        .as_u64()
                        .ok_or_else(|| BackendError::Query(format!("$limit expects a number, got {spec}")))?;
                    docs.truncate(limit as usize);
                }
                "$count" => {
                    let field = spec
                        .as_str()
                        .ok_or_else(|| BackendError::Query(format!("$count expects a string, got {spec}")))?;
                    docs = vec![serde_json::json!({ field: docs.len() })];
                }
                other => {
                    return Err(BackendError::Query(format!(
                        "unsupported pipeline stage '{other}'"
                    )))
                }
            }
        }
        Ok(docs)
    }

    async fn list_collections(&self) -> Result<Vec<String>, BackendError> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections.keys().cloned().collect())
    }
}
