//! # Recursive Write Engine
//!
//! Depth-first create/update over a request graph. Each row runs
//! DetermineAction → PrepareRow → PersistRow → PersistFile → RecurseChildren
//! on the caller's transaction; the first error aborts the walk and the
//! caller rolls the transaction back.

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::file_stage::PendingPlaceholder;
use super::foreign_key::{self, LinkContext};
use super::result::WriteResult;
use super::{rows_of, GraphAction, RequestGraph};
use crate::config::EngineConfig;
use crate::crud::{is_blank, Crud, ReadQuery, RecordKey};
use crate::errors::{GraphError, GraphResult};
use crate::executor::{Connection, Row};
use crate::file_storage::{FilePayload, FileStore};
use crate::model::{ChildRelation, EntityModel};
use crate::schema::{SchemaCache, TableSchema};

/// What a finished run leaves behind for the caller
#[derive(Debug, Default)]
pub(crate) struct WriteOutput {
    pub(crate) result: WriteResult,
    /// Files stored during the run; orphans if the transaction rolls back
    pub(crate) stored: Vec<String>,
    /// Files superseded by an update; removable once committed
    pub(crate) replaced: Vec<String>,
}

/// Persisted parent of the rows being written
struct ParentLink<'p> {
    model: &'p EntityModel,
    relation: &'p ChildRelation,
    row: &'p Row,
    primary_key: &'p str,
}

pub(crate) struct WriteRun<'a, C: Connection> {
    crud: Crud<'a, C>,
    files: &'a FileStore,
    config: &'a EngineConfig,
    output: WriteOutput,
}

impl<'a, C: Connection> WriteRun<'a, C> {
    pub(crate) fn new(
        conn: &'a C,
        schemas: &'a SchemaCache,
        files: &'a FileStore,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            crud: Crud::new(conn, schemas, config),
            files,
            config,
            output: WriteOutput::default(),
        }
    }

    pub(crate) fn finish(self) -> WriteOutput {
        self.output
    }

    pub(crate) async fn write_graph(
        &mut self,
        root: &EntityModel,
        request: &RequestGraph,
        action: GraphAction,
    ) -> GraphResult<()> {
        for (table, value) in request {
            let model = root
                .find_model(table)
                .ok_or_else(|| GraphError::UnknownTable(table.clone()))?;
            self.write_rows(model, rows_of(table, value)?, None, action)
                .await?;
        }
        Ok(())
    }

    fn write_rows<'s>(
        &'s mut self,
        model: &'s EntityModel,
        rows: &'s [Value],
        parent: Option<&'s ParentLink<'s>>,
        inherited: GraphAction,
    ) -> LocalBoxFuture<'s, GraphResult<()>> {
        async move {
            for value in rows {
                let payload = value.as_object().ok_or_else(|| {
                    GraphError::InvalidPayload(format!("rows of {} must be objects", model.table()))
                })?;
                self.write_row(model, payload, parent, inherited).await?;
            }
            Ok(())
        }
        .boxed_local()
    }

    async fn write_row(
        &mut self,
        model: &EntityModel,
        payload: &Row,
        parent: Option<&ParentLink<'_>>,
        inherited: GraphAction,
    ) -> GraphResult<()> {
        let table = model.table();
        let schema = self
            .crud
            .schema(table)
            .await
            .map_err(|e| e.in_table(table, inherited))?;
        let pk = model.primary_key(&schema);

        let (action, existing) = self
            .determine_action(table, &pk, payload, inherited)
            .await
            .map_err(|e| e.in_table(table, inherited))?;

        let row = self
            .persist(model, &schema, &pk, payload, parent, action, existing)
            .await
            .map_err(|e| e.in_table(table, action))?;

        for relation in model.children() {
            let Some(value) = payload.get(relation.table()) else {
                continue;
            };
            let rows = rows_of(relation.table(), value).map_err(|e| e.in_table(table, action))?;
            let link = ParentLink {
                model,
                relation,
                row: &row,
                primary_key: &pk,
            };
            self.write_rows(&relation.model, rows, Some(&link), action)
                .await?;
        }

        self.output.result.record(action, table, row);
        Ok(())
    }

    /// Create when told to, when the parent was just created or when the row
    /// has no key; otherwise probe by key.
    ///
    /// The probe and the later write are not atomic: a racing creator of the
    /// same key surfaces as `Conflict` when this call inserts.
    async fn determine_action(
        &self,
        table: &str,
        pk: &str,
        payload: &Row,
        inherited: GraphAction,
    ) -> GraphResult<(GraphAction, Option<Row>)> {
        let id = match payload.get(pk) {
            Some(id) if !is_blank(id) => id.clone(),
            _ => return Ok((GraphAction::Create, None)),
        };
        if inherited == GraphAction::Create {
            return Ok((GraphAction::Create, None));
        }

        let query = ReadQuery::by_id(id).key_column(pk).with_deleted();
        let existing = self.crud.read(table, &query).await?.into_record();
        Ok(match existing {
            Some(row) => (GraphAction::Update, Some(row)),
            None => (GraphAction::Create, None),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &mut self,
        model: &EntityModel,
        schema: &TableSchema,
        pk: &str,
        payload: &Row,
        parent: Option<&ParentLink<'_>>,
        action: GraphAction,
        existing: Option<Row>,
    ) -> GraphResult<Row> {
        let table = model.table();
        let creating = action == GraphAction::Create;

        // PrepareRow
        let mut row = schema.column_set().filter(payload);
        if let Some(parent) = parent {
            link_to_parent(parent, schema, &mut row)?;
        }

        if creating {
            model.apply_defaults(&mut row);
            let absent = row.get(pk).map_or(true, is_blank);
            let textual = schema.column(pk).is_some_and(|c| c.column_type.is_textual());
            if absent && textual {
                row.insert(pk.to_string(), Value::String(Uuid::new_v4().to_string()));
            }
        } else if row.get(pk).map_or(true, is_blank) {
            return Err(GraphError::MissingPrimaryKey {
                table: table.to_string(),
                field: pk.to_string(),
            });
        }
        model.validate(&row, creating)?;

        let pending = match model.attachment() {
            Some(attachment) => match FilePayload::from_row(table, payload)? {
                Some(file) => {
                    if !schema.has_column(&attachment.column) {
                        return Err(GraphError::InvalidPayload(format!(
                            "attachment column {} does not exist in {}",
                            attachment.column, table
                        )));
                    }
                    attachment.validate(table, &file, self.config.max_file_bytes)?;
                    Some(PendingPlaceholder::new(attachment, file))
                }
                None => None,
            },
            None => None,
        };

        // PersistRow
        if let Some(pending) = &pending {
            pending.mark(&mut row, &self.config.file_placeholder);
        }
        let persisted = if creating {
            self.crud.create(table, &row).await?
        } else {
            let key = RecordKey::column(pk, row.get(pk).cloned().unwrap_or(Value::Null));
            let nothing_to_set = pending.is_none() && row.keys().all(|k| k == pk);
            match &existing {
                Some(current) if nothing_to_set => current.clone(),
                _ => self.crud.update(table, &key, &row).await?,
            }
        };

        // PersistFile
        let Some(pending) = pending else {
            return Ok(persisted);
        };
        let entity_id = persisted
            .get(pk)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| GraphError::MissingPrimaryKey {
                table: table.to_string(),
                field: pk.to_string(),
            })?;
        let key = RecordKey::column(pk, entity_id.clone());

        let stored = pending.row_persisted(&entity_id).store(self.files).await?;
        self.output.stored.push(stored.path().to_string());
        let updated = stored.update_reference(&self.crud, table, &key).await?;
        debug!(table, path = %updated.path, "attachment stored");

        let previous = model
            .attachment()
            .zip(existing.as_ref())
            .and_then(|(attachment, current)| current.get(&attachment.column))
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty() && *p != self.config.file_placeholder && *p != updated.path);
        if let Some(previous) = previous {
            self.output.replaced.push(previous.to_string());
        }

        Ok(updated.row)
    }
}

/// Set the child's linking column to the parent's key.
///
/// A child with no resolvable link is written as supplied.
fn link_to_parent(parent: &ParentLink<'_>, schema: &TableSchema, row: &mut Row) -> GraphResult<()> {
    let ctx = LinkContext {
        parent: parent.model,
        relation: parent.relation,
        child_schema: schema,
    };
    let Some(fk) = foreign_key::resolve(&ctx) else {
        debug!(
            parent = parent.model.table(),
            child = parent.relation.table(),
            "no foreign key to inject"
        );
        return Ok(());
    };
    if !schema.has_column(&fk.column) {
        return Err(GraphError::UnresolvableForeignKey {
            parent: parent.model.table().to_string(),
            child: parent.relation.table().to_string(),
        });
    }

    let field = fk.parent_field.as_deref().unwrap_or(parent.primary_key);
    let value = parent
        .row
        .get(field)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| GraphError::MissingPrimaryKey {
            table: parent.model.table().to_string(),
            field: field.to_string(),
        })?;
    row.insert(fk.column, value);
    Ok(())
}
