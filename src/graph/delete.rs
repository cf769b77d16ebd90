//! # Recursive Delete Engine
//!
//! Planning walks the request graph. A row that carries non-empty child
//! arrays is a navigational path: it stays, and only the supplied children
//! are visited. A row without child arrays is a deletion target: it is
//! queued together with every live descendant fetched from storage.
//!
//! The deduplicated queue runs children before parents, either item by
//! item with per-item outcomes or inside one transaction.

use std::collections::HashSet;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use tracing::{debug, warn};

use super::foreign_key::{self, LinkContext};
use super::result::{DeleteOutcome, DeleteResult};
use super::{rows_of, RequestGraph};
use crate::config::EngineConfig;
use crate::crud::{is_blank, Conditions, Crud, ReadQuery, RecordKey};
use crate::errors::{GraphError, GraphResult};
use crate::executor::Connection;
use crate::file_storage::{FileStore, StorageError};
use crate::model::{ChildRelation, EntityModel};
use crate::schema::SchemaCache;

/// One row scheduled for deletion
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeleteItem {
    pub(crate) table: String,
    pub(crate) id: Value,
    pub(crate) primary_key: String,
    /// Reference column of the model's attachment, if it has one
    pub(crate) file_column: Option<String>,
}

impl DeleteItem {
    fn key(&self) -> RecordKey {
        RecordKey::column(self.primary_key.clone(), self.id.clone())
    }
}

pub(crate) struct DeletePlanner<'a, C: Connection> {
    crud: Crud<'a, C>,
    queue: Vec<DeleteItem>,
    seen: HashSet<(String, String)>,
}

impl<'a, C: Connection> DeletePlanner<'a, C> {
    pub(crate) fn new(conn: &'a C, schemas: &'a SchemaCache, config: &'a EngineConfig) -> Self {
        Self {
            crud: Crud::new(conn, schemas, config),
            queue: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Queue in execution order (descendants first)
    pub(crate) async fn plan_graph(
        mut self,
        root: &EntityModel,
        request: &RequestGraph,
    ) -> GraphResult<Vec<DeleteItem>> {
        for (table, value) in request {
            let model = root
                .find_model(table)
                .ok_or_else(|| GraphError::UnknownTable(table.clone()))?;
            self.plan_rows(model, rows_of(table, value)?).await?;
        }
        Ok(self.queue)
    }

    fn plan_rows<'s>(
        &'s mut self,
        model: &'s EntityModel,
        rows: &'s [Value],
    ) -> LocalBoxFuture<'s, GraphResult<()>> {
        async move {
            let table = model.table();
            for value in rows {
                let payload = value.as_object().ok_or_else(|| {
                    GraphError::InvalidPayload(format!("rows of {} must be objects", table))
                })?;

                let mut paths: Vec<(&ChildRelation, &[Value])> = Vec::new();
                for relation in model.children() {
                    if let Some(value) = payload.get(relation.table()) {
                        let items = rows_of(relation.table(), value)?;
                        if !items.is_empty() {
                            paths.push((relation, items));
                        }
                    }
                }

                if paths.is_empty() {
                    let schema = self.crud.schema(table).await?;
                    let pk = model.primary_key(&schema);
                    let id = payload
                        .get(&pk)
                        .filter(|v| !is_blank(v))
                        .cloned()
                        .ok_or_else(|| GraphError::MissingId(table.to_string()))?;
                    self.plan_target(model, id).await?;
                } else {
                    debug!(table, "navigational row kept");
                    for (relation, items) in paths {
                        self.plan_rows(&relation.model, items).await?;
                    }
                }
            }
            Ok(())
        }
        .boxed_local()
    }

    /// Queue every descendant stored under a row, then the row itself
    fn plan_target<'s>(
        &'s mut self,
        model: &'s EntityModel,
        id: Value,
    ) -> LocalBoxFuture<'s, GraphResult<()>> {
        async move {
            let table = model.table();
            let identity = (table.to_string(), RecordKey::Single(id.clone()).describe());
            if !self.seen.insert(identity) {
                return Ok(());
            }

            let schema = self.crud.schema(table).await?;
            let pk = model.primary_key(&schema);
            self.plan_descendants(model, &id, &pk).await?;

            // after its descendants, so the queue runs children first
            self.queue.push(DeleteItem {
                table: table.to_string(),
                id,
                primary_key: pk,
                file_column: model.attachment().map(|a| a.column.clone()),
            });
            Ok(())
        }
        .boxed_local()
    }

    /// Plan every live child stored under `id`, for each relationship
    async fn plan_descendants(&mut self, model: &EntityModel, id: &Value, pk: &str) -> GraphResult<()> {
        let table = model.table();
        if model.children().is_empty() {
            return Ok(());
        }
        let query = ReadQuery::by_id(id.clone()).key_column(pk).with_deleted();
        // An absent row is reported when the queue runs
        let Some(row) = self.crud.read(table, &query).await?.into_record() else {
            return Ok(());
        };

        for relation in model.children() {
            let child_table = relation.table();
            let child_schema = self.crud.schema(child_table).await?;
            let fk = foreign_key::require(&LinkContext {
                parent: model,
                relation,
                child_schema: &child_schema,
            })?;
            let field = fk.parent_field.as_deref().unwrap_or(pk);
            let Some(value) = row.get(field).filter(|v| !v.is_null()).cloned() else {
                continue;
            };

            let query = ReadQuery::all()
                .filter(Conditions::new().eq(fk.column, value))
                .with_deleted();
            let records = self.crud.read(child_table, &query).await?.into_records();
            let child_pk = relation.model.primary_key(&child_schema);
            for record in records {
                if let Some(child_id) = record.get(&child_pk).filter(|v| !v.is_null()) {
                    self.plan_target(&relation.model, child_id.clone()).await?;
                }
            }
        }
        Ok(())
    }
}

/// Runs a planned queue
pub(crate) struct DeleteExecutor<'a, C: Connection> {
    crud: Crud<'a, C>,
    files: &'a FileStore,
    config: &'a EngineConfig,
    soft: bool,
}

impl<'a, C: Connection> DeleteExecutor<'a, C> {
    pub(crate) fn new(
        conn: &'a C,
        schemas: &'a SchemaCache,
        files: &'a FileStore,
        config: &'a EngineConfig,
        soft: bool,
    ) -> Self {
        Self {
            crud: Crud::new(conn, schemas, config),
            files,
            config,
            soft,
        }
    }

    /// Every item is attempted; failures are reported, not raised
    pub(crate) async fn run_best_effort(&self, queue: &[DeleteItem]) -> DeleteResult {
        let mut result = DeleteResult::default();
        for item in queue {
            match self.delete_with_file(item).await {
                Ok(()) => result.record(&item.table, DeleteOutcome::deleted(item.id.clone())),
                Err(err) => {
                    warn!(table = %item.table, id = %item.id, error = %err, "delete failed");
                    result.record(&item.table, DeleteOutcome::failed(item.id.clone(), err.to_string()));
                }
            }
        }
        result
    }

    /// Stop at the first failure. Returns the outcomes plus the files to
    /// remove once the caller commits.
    pub(crate) async fn run_atomic(
        &self,
        queue: &[DeleteItem],
    ) -> GraphResult<(DeleteResult, Vec<String>)> {
        let mut result = DeleteResult::default();
        let mut files = Vec::new();
        for item in queue {
            let file = self
                .bound_file(item)
                .await
                .map_err(|e| e.in_table(&item.table, "delete"))?;
            self.crud
                .delete(&item.table, &item.key(), self.soft)
                .await
                .map_err(|e| e.in_table(&item.table, "delete"))?;
            files.extend(file);
            result.record(&item.table, DeleteOutcome::deleted(item.id.clone()));
        }
        Ok((result, files))
    }

    /// Remove the bound file, then the row
    async fn delete_with_file(&self, item: &DeleteItem) -> GraphResult<()> {
        if let Some(path) = self.bound_file(item).await? {
            match self.files.delete(&path).await {
                Ok(()) | Err(StorageError::ObjectNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.crud.delete(&item.table, &item.key(), self.soft).await?;
        Ok(())
    }

    /// Stored file the row references. Soft deletes keep their files.
    async fn bound_file(&self, item: &DeleteItem) -> GraphResult<Option<String>> {
        let Some(column) = item.file_column.as_deref() else {
            return Ok(None);
        };
        if self.soft {
            return Ok(None);
        }
        let query = ReadQuery::by_id(item.id.clone())
            .key_column(item.primary_key.as_str())
            .with_deleted();
        let row = self
            .crud
            .read(&item.table, &query)
            .await?
            .into_record()
            .ok_or_else(|| GraphError::RecordNotFound {
                table: item.table.clone(),
                id: RecordKey::Single(item.id.clone()).describe(),
            })?;
        Ok(row
            .get(column)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty() && *p != self.config.file_placeholder)
            .map(str::to_string))
    }
}
