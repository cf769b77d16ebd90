//! # CRUD Primitive
//!
//! Schema-filtered dynamic INSERT/SELECT/UPDATE/DELETE. Every statement is
//! built from the intersection of the payload with the table's columns;
//! payload fields the table does not have are silently dropped.

use std::rc::Rc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::conditions::WhereClause;
use super::query::{is_blank, IdSelector, Pagination, ReadOutcome, ReadQuery, RecordKey};
use crate::config::EngineConfig;
use crate::errors::{GraphError, GraphResult};
use crate::executor::{Connection, Row, Statement};
use crate::schema::{quote_ident, SchemaCache, TableSchema};

/// Column assumed to be the key when the schema flags none
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// Current time as stamped into timestamp columns
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// CRUD operations over one connection (plain or transactional)
pub struct Crud<'a, C: Connection> {
    conn: &'a C,
    schemas: &'a SchemaCache,
    config: &'a EngineConfig,
}

impl<'a, C: Connection> Crud<'a, C> {
    pub fn new(conn: &'a C, schemas: &'a SchemaCache, config: &'a EngineConfig) -> Self {
        Self {
            conn,
            schemas,
            config,
        }
    }

    pub fn connection(&self) -> &'a C {
        self.conn
    }

    /// Schema of `table`, through the per-call cache
    pub async fn schema(&self, table: &str) -> GraphResult<Rc<TableSchema>> {
        self.schemas.get(self.conn, table).await
    }

    /// Insert a row and return it as stored.
    ///
    /// A textual primary key absent from `data` gets a UUID; `created_at`
    /// and `updated_at` are stamped when the table has them.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn create(&self, table: &str, data: &Row) -> GraphResult<Row> {
        let schema = self.schema(table).await?;
        let mut values = schema.column_set().filter(data);

        let pk = schema.primary_key();
        if let Some(pk) = pk {
            let absent = values.get(&pk.name).map_or(true, is_blank);
            if absent && pk.column_type.is_textual() {
                values.insert(pk.name.clone(), Value::String(Uuid::new_v4().to_string()));
            } else if absent {
                values.remove(&pk.name);
            }
        }

        let now = timestamp_now();
        for column in [&self.config.created_at_column, &self.config.updated_at_column] {
            if schema.has_column(column) {
                values.insert(column.clone(), Value::String(now.clone()));
            }
        }

        if values.is_empty() {
            return Err(GraphError::NoValidColumns(table.to_string()));
        }

        let mut columns = Vec::with_capacity(values.len());
        for name in values.keys() {
            columns.push(quote_ident(name)?);
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table)?,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let outcome = self
            .conn
            .execute(&Statement::with_params(sql, values.values().cloned().collect()))
            .await?;

        let Some(pk) = pk else {
            return Ok(values);
        };
        let key = values
            .get(&pk.name)
            .cloned()
            .or_else(|| outcome.last_insert_id.map(Value::from));
        let Some(key) = key else {
            return Ok(values);
        };

        debug!(id = %key, "row created");
        self.fetch_one(&schema, &RecordKey::column(pk.name.clone(), key.clone()), true)
            .await?
            .ok_or_else(|| GraphError::RecordNotFound {
                table: table.to_string(),
                id: RecordKey::Single(key).describe(),
            })
    }

    /// Read rows; see `ReadQuery` for the modes
    #[instrument(skip_all, fields(table = %table))]
    pub async fn read(&self, table: &str, query: &ReadQuery) -> GraphResult<ReadOutcome> {
        let schema = self.schema(table).await?;
        let columns = schema.column_set();
        let key_column = query
            .key_column
            .clone()
            .unwrap_or_else(|| primary_key_name(&schema));
        let quoted_key = quote_ident(&key_column)?;

        let projection = match &query.fields {
            Some(fields) => {
                let known: Vec<String> = fields
                    .iter()
                    .filter(|f| columns.contains(f))
                    .map(|f| quote_ident(f))
                    .collect::<GraphResult<_>>()?;
                if known.is_empty() {
                    "*".to_string()
                } else {
                    known.join(", ")
                }
            }
            None => "*".to_string(),
        };

        let mut clause = WhereClause::default();
        match &query.id {
            Some(IdSelector::Single(id)) => clause.push(format!("{} = ?", quoted_key), [id.clone()]),
            Some(IdSelector::Many(ids)) => clause.push_in(&quoted_key, ids),
            None => {}
        }
        query.conditions.compile(&columns, &mut clause)?;

        let soft = &self.config.soft_delete_column;
        if schema.has_column(soft) && !query.with_deleted && !query.conditions.mentions(soft) {
            clause.push(format!("{} IS NULL", quote_ident(soft)?), []);
        }

        let from = format!("FROM {}{}", quote_ident(table)?, clause.sql());

        if let Some(IdSelector::Single(_)) = &query.id {
            let sql = format!("SELECT {} {} LIMIT 1", projection, from);
            let rows = self
                .conn
                .query(&Statement::with_params(sql, clause.params().to_vec()))
                .await?;
            return Ok(ReadOutcome::Record(rows.into_iter().next()));
        }

        let count_sql = format!("SELECT COUNT(*) AS total {}", from);
        let count_rows = self
            .conn
            .query(&Statement::with_params(count_sql, clause.params().to_vec()))
            .await?;
        let total = count_rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;

        let order_column = query
            .order_by
            .as_deref()
            .filter(|c| columns.contains(c))
            .or_else(|| columns.contains(&key_column).then_some(key_column.as_str()));
        let order = match order_column {
            Some(column) => format!(" ORDER BY {} {}", quote_ident(column)?, query.direction.as_sql()),
            None => String::new(),
        };

        let mut params = clause.params().to_vec();
        let (pagination, limit_sql) = if query.is_paged() {
            let limit = self.config.clamp_limit(query.limit);
            let pagination = Pagination::new(query.page.unwrap_or(1).max(1), limit, total);
            params.push(Value::from(pagination.limit as u64));
            params.push(Value::from(pagination.offset() as u64));
            (pagination, " LIMIT ? OFFSET ?")
        } else {
            (Pagination::new(1, total, total), "")
        };

        let sql = format!("SELECT {} {}{}{}", projection, from, order, limit_sql);
        let records = self.conn.query(&Statement::with_params(sql, params)).await?;
        debug!(rows = records.len(), total, "rows read");

        Ok(ReadOutcome::Records {
            records,
            pagination,
        })
    }

    /// Single row by key, or `None`
    pub async fn find(&self, table: &str, key: &RecordKey) -> GraphResult<Option<Row>> {
        let schema = self.schema(table).await?;
        self.fetch_one(&schema, key, false).await
    }

    /// Update a row and return it as stored
    #[instrument(skip_all, fields(table = %table))]
    pub async fn update(&self, table: &str, key: &RecordKey, data: &Row) -> GraphResult<Row> {
        if key.is_missing() {
            return Err(GraphError::MissingId(table.to_string()));
        }
        let schema = self.schema(table).await?;
        let key_clause = key_clause(&schema, key)?;
        let key_columns = key_columns(&schema, key);

        let mut values = schema.column_set().filter(data);
        values.retain(|name, _| !key_columns.iter().any(|k| k == name));
        if schema.has_column(&self.config.updated_at_column) {
            values.insert(
                self.config.updated_at_column.clone(),
                Value::String(timestamp_now()),
            );
        }
        if values.is_empty() {
            return Err(GraphError::NoValidColumns(table.to_string()));
        }

        let mut assignments = Vec::with_capacity(values.len());
        for name in values.keys() {
            assignments.push(format!("{} = ?", quote_ident(name)?));
        }
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote_ident(table)?,
            assignments.join(", "),
            key_clause.sql()
        );
        let mut params: Vec<Value> = values.values().cloned().collect();
        params.extend(key_clause.params().iter().cloned());
        self.conn.execute(&Statement::with_params(sql, params)).await?;

        self.fetch_one(&schema, key, true)
            .await?
            .ok_or_else(|| GraphError::RecordNotFound {
                table: table.to_string(),
                id: key.describe(),
            })
    }

    /// Delete a row, soft when requested and supported; returns the
    /// pre-deletion snapshot
    #[instrument(skip_all, fields(table = %table, soft))]
    pub async fn delete(&self, table: &str, key: &RecordKey, soft: bool) -> GraphResult<Row> {
        if key.is_missing() {
            return Err(GraphError::MissingId(table.to_string()));
        }
        let schema = self.schema(table).await?;
        let key_clause = key_clause(&schema, key)?;

        let snapshot = self
            .fetch_one(&schema, key, true)
            .await?
            .ok_or_else(|| GraphError::RecordNotFound {
                table: table.to_string(),
                id: key.describe(),
            })?;

        let soft_column = &self.config.soft_delete_column;
        let stmt = if soft && schema.has_column(soft_column) {
            let mut params = vec![Value::String(timestamp_now())];
            params.extend(key_clause.params().iter().cloned());
            Statement::with_params(
                format!(
                    "UPDATE {} SET {} = ?{}",
                    quote_ident(table)?,
                    quote_ident(soft_column)?,
                    key_clause.sql()
                ),
                params,
            )
        } else {
            Statement::with_params(
                format!("DELETE FROM {}{}", quote_ident(table)?, key_clause.sql()),
                key_clause.params().to_vec(),
            )
        };
        self.conn.execute(&stmt).await?;
        debug!(id = %key.describe(), "row deleted");

        Ok(snapshot)
    }

    async fn fetch_one(
        &self,
        schema: &TableSchema,
        key: &RecordKey,
        with_deleted: bool,
    ) -> GraphResult<Option<Row>> {
        let mut clause = key_clause(schema, key)?;
        let soft = &self.config.soft_delete_column;
        if !with_deleted && schema.has_column(soft) {
            clause.push(format!("{} IS NULL", quote_ident(soft)?), []);
        }
        let sql = format!(
            "SELECT * FROM {}{} LIMIT 1",
            quote_ident(&schema.name)?,
            clause.sql()
        );
        let rows = self
            .conn
            .query(&Statement::with_params(sql, clause.params().to_vec()))
            .await?;
        Ok(rows.into_iter().next())
    }
}

/// Schema-flagged primary key, else `id`
pub fn primary_key_name(schema: &TableSchema) -> String {
    schema
        .primary_key()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| DEFAULT_KEY_COLUMN.to_string())
}

fn key_columns(schema: &TableSchema, key: &RecordKey) -> Vec<String> {
    match key {
        RecordKey::Single(_) => vec![primary_key_name(schema)],
        RecordKey::Composite(map) => map.keys().cloned().collect(),
    }
}

/// WHERE clause selecting exactly the keyed row. Key columns the table
/// lacks are an error: dropping them would widen the match.
fn key_clause(schema: &TableSchema, key: &RecordKey) -> GraphResult<WhereClause> {
    let pairs: Map<String, Value> = match key {
        RecordKey::Single(value) => {
            let mut map = Map::new();
            map.insert(primary_key_name(schema), value.clone());
            map
        }
        RecordKey::Composite(map) => map.clone(),
    };

    let mut clause = WhereClause::default();
    for (column, value) in pairs {
        if !schema.has_column(&column) {
            return Err(GraphError::InvalidPayload(format!(
                "key column {} does not exist in {}",
                column, schema.name
            )));
        }
        clause.push(format!("{} = ?", quote_ident(&column)?), [value]);
    }
    Ok(clause)
}
