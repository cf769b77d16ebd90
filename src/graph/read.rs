//! # Recursive Read Engine
//!
//! Hydrates a request graph depth-first. Branches are independent: a child
//! relationship that cannot be fetched is recorded in `ReadResult::errors`
//! and left out of its parent row, and the rest of the graph still returns.

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use tokio::task;
use tracing::warn;

use super::foreign_key::{self, LinkContext};
use super::result::{BranchError, ReadResult};
use super::{rows_of, GraphOptions, RequestGraph};
use crate::config::EngineConfig;
use crate::crud::{is_blank, Conditions, Crud, ReadQuery};
use crate::errors::{GraphError, GraphResult};
use crate::executor::{Connection, Row};
use crate::file_storage::{
    compress_image, content_type_for_path, sniff_content_type, to_data_url, FileStore,
    FILE_COMPRESSED_FIELD, FILE_DATA_FIELD, FILE_NAME_FIELD,
};
use crate::model::{ChildRelation, EntityModel, FileAttachment};
use crate::schema::SchemaCache;

/// Set on a requested row whose record does not exist
pub const NOT_FOUND_FIELD: &str = "_not_found";

pub(crate) struct ReadRun<'a, C: Connection> {
    crud: Crud<'a, C>,
    files: &'a FileStore,
    config: &'a EngineConfig,
    options: &'a GraphOptions,
    errors: Vec<BranchError>,
}

impl<'a, C: Connection> ReadRun<'a, C> {
    pub(crate) fn new(
        conn: &'a C,
        schemas: &'a SchemaCache,
        files: &'a FileStore,
        config: &'a EngineConfig,
        options: &'a GraphOptions,
    ) -> Self {
        Self {
            crud: Crud::new(conn, schemas, config),
            files,
            config,
            options,
            errors: Vec::new(),
        }
    }

    pub(crate) async fn read_graph(
        mut self,
        root: &EntityModel,
        request: &RequestGraph,
    ) -> GraphResult<ReadResult> {
        let mut result = ReadResult::default();

        for (table, value) in request {
            let model = root
                .find_model(table)
                .ok_or_else(|| GraphError::UnknownTable(table.clone()))?;
            let rows = rows_of(table, value)?;

            let payloads = if rows.is_empty() {
                match self.list(model).await {
                    Ok(records) => records,
                    Err(err) => {
                        self.branch_failed(table, None, &err);
                        continue;
                    }
                }
            } else {
                rows.iter()
                    .map(|value| {
                        value.as_object().cloned().ok_or_else(|| {
                            GraphError::InvalidPayload(format!("rows of {} must be objects", table))
                        })
                    })
                    .collect::<GraphResult<Vec<Row>>>()?
            };

            let mut hydrated = Vec::with_capacity(payloads.len());
            for payload in payloads {
                match self.read_row(model, payload).await {
                    Ok(row) => hydrated.push(row),
                    Err(err) => self.branch_failed(table, None, &err),
                }
            }
            result.data.insert(table.clone(), hydrated);
        }

        result.errors = self.errors;
        Ok(result)
    }

    /// Rows of a table requested with an empty array
    async fn list(&self, model: &EntityModel) -> GraphResult<Vec<Row>> {
        let mut query = ReadQuery::all();
        if let Some(page) = self.options.page {
            query = query.page(page);
        }
        if let Some(limit) = self.options.limit {
            query = query.limit(limit);
        }
        Ok(self.crud.read(model.table(), &query).await?.into_records())
    }

    fn read_row<'s>(
        &'s mut self,
        model: &'s EntityModel,
        payload: Row,
    ) -> LocalBoxFuture<'s, GraphResult<Row>> {
        async move {
            let table = model.table();
            let schema = self.crud.schema(table).await?;
            let pk = model.primary_key(&schema);

            let mut row = if is_identifier_only(model, &payload, &pk) {
                let id = payload.get(&pk).cloned().unwrap_or(Value::Null);
                let query = ReadQuery::by_id(id.clone()).key_column(pk.as_str());
                match self.crud.read(table, &query).await?.into_record() {
                    Some(found) => found,
                    None => return Ok(not_found(&pk, id)),
                }
            } else {
                payload
                    .into_iter()
                    .filter(|(key, _)| model.child(key).is_none())
                    .collect()
            };
            let id = row.get(&pk).cloned();

            if self.options.inflate_files {
                if let Some(attachment) = model.attachment() {
                    if let Err(err) = self.inflate(attachment, &mut row).await {
                        self.branch_failed(table, id.clone(), &err);
                    }
                }
            }

            for relation in model.children() {
                match self.read_children(model, &pk, &row, relation).await {
                    Ok(children) => {
                        let children = children.into_iter().map(Value::Object).collect();
                        row.insert(relation.table().to_string(), Value::Array(children));
                    }
                    Err(err) => self.branch_failed(relation.table(), id.clone(), &err),
                }
            }
            Ok(row)
        }
        .boxed_local()
    }

    async fn read_children(
        &mut self,
        parent: &EntityModel,
        parent_pk: &str,
        parent_row: &Row,
        relation: &ChildRelation,
    ) -> GraphResult<Vec<Row>> {
        let child_table = relation.table();
        let child_schema = self.crud.schema(child_table).await?;
        let fk = foreign_key::require(&LinkContext {
            parent,
            relation,
            child_schema: &child_schema,
        })?;

        let field = fk.parent_field.as_deref().unwrap_or(parent_pk);
        let value = parent_row
            .get(field)
            .filter(|v| !is_blank(v))
            .cloned()
            .ok_or_else(|| GraphError::MissingId(parent.table().to_string()))?;
        let parent_id = parent_row.get(parent_pk).cloned();

        let query = ReadQuery::all().filter(Conditions::new().eq(fk.column, value));
        let records = self.crud.read(child_table, &query).await?.into_records();

        let mut children = Vec::with_capacity(records.len());
        for record in records {
            match self.read_row(&relation.model, record).await {
                Ok(child) => children.push(child),
                Err(err) => self.branch_failed(child_table, parent_id.clone(), &err),
            }
        }
        Ok(children)
    }

    /// Embed the stored file as a data URL, re-encoding images when asked
    async fn inflate(&self, attachment: &FileAttachment, row: &mut Row) -> GraphResult<()> {
        let Some(path) = row
            .get(&attachment.column)
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty() && *p != self.config.file_placeholder)
            .map(str::to_string)
        else {
            return Ok(());
        };

        let bytes = self.files.read(&path).await?;
        let is_image = image::guess_format(&bytes).is_ok();

        let (bytes, content_type, compressed) = if self.options.compress_images && is_image {
            let bounds = self.options.compression(&self.config.compression);
            let reencoded = task::spawn_blocking(move || compress_image(&bytes, &bounds))
                .await
                .map_err(|e| GraphError::StorageReadFailed(e.to_string()))??;
            (reencoded.bytes, reencoded.content_type.to_string(), true)
        } else {
            let content_type = match sniff_content_type(&bytes) {
                "application/octet-stream" => content_type_for_path(&path),
                sniffed => sniffed,
            };
            (bytes, content_type.to_string(), false)
        };

        let file_name = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
        row.insert(
            FILE_DATA_FIELD.to_string(),
            Value::String(to_data_url(&content_type, &bytes)),
        );
        row.insert(FILE_NAME_FIELD.to_string(), Value::String(file_name));
        if compressed {
            row.insert(FILE_COMPRESSED_FIELD.to_string(), Value::Bool(true));
        }
        Ok(())
    }

    fn branch_failed(&mut self, table: &str, parent_id: Option<Value>, err: &GraphError) {
        warn!(table, parent_id = ?parent_id, error = %err, "read branch dropped");
        self.errors.push(BranchError {
            table: table.to_string(),
            parent_id,
            message: err.to_string(),
        });
    }
}

/// Only the key is supplied (child arrays aside), so the row must be fetched
fn is_identifier_only(model: &EntityModel, payload: &Row, pk: &str) -> bool {
    let has_id = payload.get(pk).is_some_and(|v| !is_blank(v));
    has_id
        && payload
            .keys()
            .filter(|key| model.child(key).is_none())
            .all(|key| key == pk)
}

fn not_found(pk: &str, id: Value) -> Row {
    let mut row = Row::new();
    row.insert(pk.to_string(), id);
    row.insert(NOT_FOUND_FIELD.to_string(), Value::Bool(true));
    row
}
