//! The `store_*` tools: thin adapters from coerced arguments to the
//! backend, with `{"success": true, ...}` payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::args::ToolArgs;
use crate::registry::{RegistryError, ToolRegistry};
use crate::spec::{ParamKind, ParamSpec, ToolSpec};
use crate::tool::{Tool, ToolError};

use super::backend::{BackendError, DocStoreBackend};

const DEFAULT_FIND_LIMIT: i64 = 10;

impl From<BackendError> for ToolError {
    fn from(e: BackendError) -> Self {
        ToolError::ExecutionFailed(e.to_string())
    }
}

fn collection_param() -> ParamSpec {
    ParamSpec::required("collection", ParamKind::Text, "Collection to query")
}

fn filter_param() -> ParamSpec {
    ParamSpec::optional(
        "filter_json",
        ParamKind::JsonText,
        "JSON filter object; empty matches every document",
        json!("{}"),
    )
}

pub struct StoreFindTool {
    backend: Arc<dyn DocStoreBackend>,
}

impl StoreFindTool {
    pub fn new(backend: Arc<dyn DocStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for StoreFindTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "store_find".to_string(),
            description: "Find documents in a collection matching a JSON filter.".to_string(),
            params: vec![
                collection_param(),
                filter_param(),
                ParamSpec::optional(
                    "limit",
                    ParamKind::Integer,
                    "Maximum number of documents to return",
                    json!(DEFAULT_FIND_LIMIT),
                ),
            ],
        }
    }

    async fn run(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let collection = args.text("collection")?;
        let filter = args.json_text("filter_json")?;
        let limit = args.integer("limit")?.max(0) as usize;
        let documents = self.backend.find(collection, filter, limit).await?;
        Ok(json!({
            "success": true,
            "count": documents.len(),
            "documents": documents,
        }))
    }
}

pub struct StoreFindOneTool {
    backend: Arc<dyn DocStoreBackend>,
}

impl StoreFindOneTool {
    pub fn new(backend: Arc<dyn DocStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for StoreFindOneTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "store_find_one".to_string(),
            description: "Find the first document in a collection matching a JSON filter."
                .to_string(),
            params: vec![collection_param(), filter_param()],
        }
    }

    async fn run(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let collection = args.text("collection")?;
        let filter = args.json_text("filter_json")?;
        let document = self.backend.find_one(collection, filter).await?;
        Ok(json!({
            "success": true,
            "document": document,
        }))
    }
}

pub struct StoreCountTool {
    backend: Arc<dyn DocStoreBackend>,
}

impl StoreCountTool {
    pub fn new(backend: Arc<dyn DocStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for StoreCountTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "store_count".to_string(),
            description: "Count documents in a collection matching a JSON filter.".to_string(),
            params: vec![collection_param(), filter_param()],
        }
    }

    async fn run(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let collection = args.text("collection")?;
        let filter = args.json_text("filter_json")?;
        let count = self.backend.count(collection, filter).await?;
        Ok(json!({"success": true, "count": count}))
    }
}

pub struct StoreAggregateTool {
    backend: Arc<dyn DocStoreBackend>,
}

impl StoreAggregateTool {
    pub fn new(backend: Arc<dyn DocStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for StoreAggregateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "store_aggregate".to_string(),
            description: "Run an aggregation pipeline against a collection.".to_string(),
            params: vec![
                collection_param(),
                ParamSpec::required(
                    "pipeline_json",
                    ParamKind::JsonText,
                    "JSON array of aggregation stages",
                ),
            ],
        }
    }

    async fn run(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let collection = args.text("collection")?;
        let pipeline = match args.json_text("pipeline_json")? {
            Value::Array(stages) => stages,
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "pipeline_json must be a JSON array, got {other}"
                )))
            }
        };
        let results = self.backend.aggregate(collection, pipeline).await?;
        Ok(json!({
            "success": true,
            "count": results.len(),
            "results": results,
        }))
    }
}

pub struct StoreListCollectionsTool {
    backend: Arc<dyn DocStoreBackend>,
}

impl StoreListCollectionsTool {
    pub fn new(backend: Arc<dyn DocStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for StoreListCollectionsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "store_list_collections".to_string(),
            description: "List the collections available in the document store.".to_string(),
            params: vec![],
        }
    }

    async fn run(&self, _args: ToolArgs) -> Result<Value, ToolError> {
        let collections = self.backend.list_collections().await?;
        Ok(json!({"success": true, "collections": collections}))
    }
}

/// Register the full store tool set over one shared backend.
pub fn register_store_tools(
    registry: &mut ToolRegistry,
    backend: Arc<dyn DocStoreBackend>,
) -> Result<(), RegistryError> {
    registry.register(StoreFindTool::new(backend.clone()))?;
    registry.register(StoreFindOneTool::new(backend.clone()))?;
    registry.register(StoreCountTool::new(backend.clone()))?;
    registry.register(StoreAggregateTool::new(backend.clone()))?;
    registry.register(StoreListCollectionsTool::new(backend))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;
    use crate::store::MemoryBackend;
    use crate::tool::ToolCall;

    fn registry() -> ToolRegistry {
        let backend = MemoryBackend::new();
        backend.insert("users", json!({"name": "ada", "age": 36}));
        backend.insert("users", json!({"name": "grace", "age": 45}));
        backend.insert("orders", json!({"user": "ada", "total": 12}));

        let mut registry = ToolRegistry::new();
        register_store_tools(&mut registry, Arc::new(backend)).unwrap();
        registry
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: name.to_string(),
            input,
        }
    }

    fn payload(result: &crate::tool::ToolResult) -> Value {
        serde_json::from_str(&result.content).unwrap()
    }

    #[tokio::test]
    async fn find_with_native_object_filter() {
        let registry = registry();
        let result = registry
            .execute(&call(
                "store_find",
                json!({"collection": "users", "filter_json": {"name": "ada"}}),
            ))
            .await;
        assert!(!result.is_error);
        let body = payload(&result);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["documents"][0]["age"], 36);
    }

    #[tokio::test]
    async fn find_without_filter_matches_all() {
        let registry = registry();
        let result = registry
            .execute(&call("store_find", json!({"collection": "users"})))
            .await;
        assert_eq!(payload(&result)["count"], 2);
    }

    #[tokio::test]
    async fn find_one_misses_with_null_document() {
        let registry = registry();
        let result = registry
            .execute(&call(
                "store_find_one",
                json!({"collection": "users", "filter_json": r#"{"name": "linus"}"#}),
            ))
            .await;
        assert!(!result.is_error);
        let body = payload(&result);
        assert_eq!(body["success"], true);
        assert_eq!(body["document"], Value::Null);
    }

    #[tokio::test]
    async fn count_with_string_filter() {
        let registry = registry();
        let result = registry
            .execute(&call(
                "store_count",
                json!({"collection": "users", "filter_json": r#"{"age": 45}"#}),
            ))
            .await;
        assert_eq!(payload(&result)["count"], 1);
    }

    #[tokio::test]
    async fn aggregate_pipeline_as_text() {
        let registry = registry();
        let result = registry
            .execute(&call(
                "store_aggregate",
                json!({
                    "collection": "users",
                    "pipeline_json": r#"[{"$match": {"name": "ada"}}, {"$count": "total"}]"#,
                }),
            ))
            .await;
        assert!(!result.is_error);
        let body = payload(&result);
        assert_eq!(body["results"], json!([{"total": 1}]));
    }

    #[tokio::test]
    async fn aggregate_rejects_non_array_pipeline() {
        let registry = registry();
        let result = registry
            .execute(&call(
                "store_aggregate",
                json!({"collection": "users", "pipeline_json": r#"{"$match": {}}"#}),
            ))
            .await;
        assert!(result.is_error);
        assert_eq!(payload(&result)["success"], false);
    }

    #[tokio::test]
    async fn list_collections_has_no_params() {
        let registry = registry();
        let result = registry
            .execute(&call("store_list_collections", json!({})))
            .await;
        let body = payload(&result);
        assert_eq!(body["collections"], json!(["orders", "users"]));
    }
}
