//! # Object-Graph Engine
//!
//! Entry point for nested, multi-table operations. A request graph maps
//! table names to row arrays; rows may nest child arrays under a child
//! table's name. `GraphEngine::process_graph_operation` dispatches to the
//! write, read or delete engine.
//!
//! # Failure semantics
//!
//! - create/update: one transaction for the whole call; the first error
//!   rolls back every row and deletes any file stored during the call
//! - read: best-effort per branch, failures listed in `ReadResult::errors`
//! - delete: best-effort per queued item, or all-or-nothing with
//!   `GraphOptions::atomic_delete`

mod delete;
mod file_stage;
pub mod foreign_key;
mod read;
mod result;
mod write;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::config::{CompressionConfig, EngineConfig};
use crate::errors::{GraphError, GraphResult};
use crate::executor::{Database, Transaction};
use crate::file_storage::{FileStore, StorageError};
use crate::model::EntityModel;
use crate::schema::SchemaCache;

use delete::{DeleteExecutor, DeletePlanner};
use read::ReadRun;
use write::WriteRun;

pub use foreign_key::{ForeignKey, KeySource, LinkContext};
pub use read::NOT_FOUND_FIELD;
pub use result::{BranchError, DeleteOutcome, DeleteResult, ReadResult, ResultGraph, WriteResult};

/// `{ table: [row, ...], ... }`; tables are processed in the order given
pub type RequestGraph = Map<String, Value>;

/// Requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphAction {
    Create,
    Update,
    Read,
    Delete,
}

impl GraphAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphAction::Create => "create",
            GraphAction::Update => "update",
            GraphAction::Read => "read",
            GraphAction::Delete => "delete",
        }
    }
}

impl fmt::Display for GraphAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphAction {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(GraphAction::Create),
            "update" => Ok(GraphAction::Update),
            "read" => Ok(GraphAction::Read),
            "delete" => Ok(GraphAction::Delete),
            _ => Err(GraphError::UnknownAction(s.to_string())),
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Embed attachment content in read rows
    pub inflate_files: bool,
    /// Re-encode inflated images within the compression bounds
    pub compress_images: bool,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u8>,
    /// Paging for tables requested with an empty row array
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Run the delete queue in one transaction
    pub atomic_delete: bool,
    /// Stamp the soft-delete column instead of removing rows
    pub soft_delete: bool,
}

impl GraphOptions {
    /// Compression bounds: per-call overrides over the engine defaults
    pub fn compression(&self, defaults: &CompressionConfig) -> CompressionConfig {
        CompressionConfig {
            max_width: self.max_width.unwrap_or(defaults.max_width),
            max_height: self.max_height.unwrap_or(defaults.max_height),
            quality: self.quality.unwrap_or(defaults.quality).clamp(1, 100),
        }
    }
}

/// Row array under `table`; `null` counts as empty
pub(crate) fn rows_of<'v>(table: &str, value: &'v Value) -> GraphResult<&'v [Value]> {
    match value {
        Value::Array(rows) => Ok(rows.as_slice()),
        Value::Null => Ok(&[]),
        _ => Err(GraphError::InvalidPayload(format!(
            "{} must map to an array of rows",
            table
        ))),
    }
}

/// Recursive persistence engine over one database and file store
#[derive(Debug)]
pub struct GraphEngine<D: Database> {
    db: D,
    files: FileStore,
    config: EngineConfig,
}

impl<D: Database> GraphEngine<D> {
    pub fn new(db: D, files: FileStore) -> Self {
        Self::with_config(db, files, EngineConfig::default())
    }

    pub fn with_config(db: D, files: FileStore, config: EngineConfig) -> Self {
        Self { db, files, config }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `action` over `request`, rooted at `model`
    #[instrument(skip_all, fields(root = model.table(), action = %action))]
    pub async fn process_graph_operation(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        action: GraphAction,
        options: &GraphOptions,
    ) -> GraphResult<ResultGraph> {
        validate_request(model, request)?;
        match action {
            GraphAction::Create | GraphAction::Update => {
                self.write(model, request, action).await.map(ResultGraph::Write)
            }
            GraphAction::Read => self.read_graph(model, request, options).await.map(ResultGraph::Read),
            GraphAction::Delete => self
                .delete_graph(model, request, options)
                .await
                .map(ResultGraph::Delete),
        }
    }

    /// Untyped entry point: the request must be a JSON object and the
    /// action one of create/update/read/delete
    pub async fn process_request(
        &self,
        model: &EntityModel,
        request: &Value,
        action: &str,
        options: &GraphOptions,
    ) -> GraphResult<ResultGraph> {
        let action = action.parse()?;
        let request = request
            .as_object()
            .ok_or_else(|| GraphError::InvalidPayload("request graph must be an object".into()))?;
        self.process_graph_operation(model, request, action, options)
            .await
    }

    pub async fn create(&self, model: &EntityModel, request: &RequestGraph) -> GraphResult<WriteResult> {
        validate_request(model, request)?;
        self.write(model, request, GraphAction::Create).await
    }

    pub async fn update(&self, model: &EntityModel, request: &RequestGraph) -> GraphResult<WriteResult> {
        validate_request(model, request)?;
        self.write(model, request, GraphAction::Update).await
    }

    pub async fn read(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        options: &GraphOptions,
    ) -> GraphResult<ReadResult> {
        validate_request(model, request)?;
        self.read_graph(model, request, options).await
    }

    pub async fn delete(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        options: &GraphOptions,
    ) -> GraphResult<DeleteResult> {
        validate_request(model, request)?;
        self.delete_graph(model, request, options).await
    }

    async fn write(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        action: GraphAction,
    ) -> GraphResult<WriteResult> {
        let tx = self.db.begin().await?;
        let schemas = SchemaCache::new(self.config.cache_schemas);
        let mut run = WriteRun::new(&tx, &schemas, &self.files, &self.config);
        let outcome = run.write_graph(model, request, action).await;
        let output = run.finish();

        if let Err(err) = outcome {
            warn!(error = %err, "write failed, rolling back");
            if let Err(rollback) = tx.rollback().await {
                error!(error = %rollback, "rollback failed");
            }
            self.discard_files(&output.stored).await;
            return Err(err);
        }

        if let Err(err) = tx.commit().await {
            self.discard_files(&output.stored).await;
            return Err(err);
        }
        self.discard_files(&output.replaced).await;

        info!(
            created = output.result.create_data.values().map(Vec::len).sum::<usize>(),
            updated = output.result.update_data.values().map(Vec::len).sum::<usize>(),
            "write committed"
        );
        Ok(output.result)
    }

    async fn read_graph(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        options: &GraphOptions,
    ) -> GraphResult<ReadResult> {
        let schemas = SchemaCache::new(self.config.cache_schemas);
        ReadRun::new(&self.db, &schemas, &self.files, &self.config, options)
            .read_graph(model, request)
            .await
    }

    async fn delete_graph(
        &self,
        model: &EntityModel,
        request: &RequestGraph,
        options: &GraphOptions,
    ) -> GraphResult<DeleteResult> {
        let schemas = SchemaCache::new(self.config.cache_schemas);

        if !options.atomic_delete {
            let queue = DeletePlanner::new(&self.db, &schemas, &self.config)
                .plan_graph(model, request)
                .await?;
            let result = DeleteExecutor::new(&self.db, &schemas, &self.files, &self.config, options.soft_delete)
                .run_best_effort(&queue)
                .await;
            info!(queued = queue.len(), failed = result.has_failures(), "delete finished");
            return Ok(result);
        }

        let tx = self.db.begin().await?;
        let outcome = async {
            let queue = DeletePlanner::new(&tx, &schemas, &self.config)
                .plan_graph(model, request)
                .await?;
            DeleteExecutor::new(&tx, &schemas, &self.files, &self.config, options.soft_delete)
                .run_atomic(&queue)
                .await
        }
        .await;

        match outcome {
            Ok((result, files)) => {
                tx.commit().await?;
                self.discard_files(&files).await;
                info!(deleted = files.len(), "atomic delete committed");
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "atomic delete failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Best-effort removal of stored files that no committed row references
    async fn discard_files(&self, paths: &[String]) {
        for path in paths {
            match self.files.delete(path).await {
                Ok(()) | Err(StorageError::ObjectNotFound(_)) => {}
                Err(err) => error!(path = %path, error = %err, "could not remove orphaned file"),
            }
        }
    }
}

/// Top-level tables must be bound to the model tree and map to row arrays
fn validate_request(model: &EntityModel, request: &RequestGraph) -> GraphResult<()> {
    if request.is_empty() {
        return Err(GraphError::InvalidPayload("request graph is empty".into()));
    }
    for (table, value) in request {
        if model.find_model(table).is_none() {
            return Err(GraphError::UnknownTable(table.clone()));
        }
        for row in rows_of(table, value)? {
            if !row.is_object() {
                return Err(GraphError::InvalidPayload(format!(
                    "rows of {} must be objects",
                    table
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_parse() {
        assert_eq!("Create".parse::<GraphAction>().unwrap(), GraphAction::Create);
        assert_eq!("delete".parse::<GraphAction>().unwrap(), GraphAction::Delete);
        let err = "upsert".parse::<GraphAction>().unwrap_err();
        assert!(matches!(err, GraphError::UnknownAction(ref a) if a == "upsert"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_compression_overrides() {
        let defaults = CompressionConfig {
            max_width: 1280,
            max_height: 1280,
            quality: 75,
        };
        let options = GraphOptions {
            max_width: Some(64),
            quality: Some(0),
            ..GraphOptions::default()
        };
        let bounds = options.compression(&defaults);
        assert_eq!((bounds.max_width, bounds.max_height, bounds.quality), (64, 1280, 1));
    }

    #[test]
    fn test_validate_request() {
        let model = EntityModel::builder("products")
            .child(EntityModel::builder("variants").build())
            .build();

        let ok = json!({"products": [{"id": "p1"}], "variants": []});
        assert!(validate_request(&model, ok.as_object().unwrap()).is_ok());

        let unknown = json!({"orders": []});
        assert!(matches!(
            validate_request(&model, unknown.as_object().unwrap()),
            Err(GraphError::UnknownTable(_))
        ));

        let scalar = json!({"products": 3});
        assert!(matches!(
            validate_request(&model, scalar.as_object().unwrap()),
            Err(GraphError::InvalidPayload(_))
        ));

        let empty = json!({});
        assert!(validate_request(&model, empty.as_object().unwrap()).is_err());
    }
}
