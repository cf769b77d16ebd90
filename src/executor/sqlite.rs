//! # SQLite Backend
//!
//! `QueryExecutor`, `SchemaProvider` and transactions over a single
//! rusqlite connection. The connection sits behind a tokio mutex; an open
//! transaction owns the guard, so statements from other callers wait until
//! it commits or rolls back.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::params_from_iter;
use serde_json::{Map, Number, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use super::connection::{Database, QueryExecutor, Transaction};
use super::statement::{ExecOutcome, Row, Statement};
use crate::errors::{GraphError, GraphResult};
use crate::schema::{quote_ident, ColumnDef, ColumnRef, ColumnType, KeyRole, SchemaProvider, TableSchema};

/// SQLite database handle
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteDatabase {
    /// Opens (or creates) a database file
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let conn = rusqlite::Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        debug!("Opened SQLite database");
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory database (useful for testing)
    pub fn open_memory() -> GraphResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        debug!("Opened in-memory SQLite database");
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements (DDL, fixtures)
    pub async fn execute_batch(&self, sql: &str) -> GraphResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

impl QueryExecutor for SqliteDatabase {
    async fn query(&self, stmt: &Statement) -> GraphResult<Vec<Row>> {
        let conn = self.conn.lock().await;
        run_query(&conn, stmt)
    }

    async fn execute(&self, stmt: &Statement) -> GraphResult<ExecOutcome> {
        let conn = self.conn.lock().await;
        run_execute(&conn, stmt)
    }
}

impl SchemaProvider for SqliteDatabase {
    async fn get_schema(&self, table: &str) -> GraphResult<TableSchema> {
        let conn = self.conn.lock().await;
        introspect(&conn, table)
    }
}

impl Database for SqliteDatabase {
    type Tx = SqliteTransaction;

    async fn begin(&self) -> GraphResult<SqliteTransaction> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| GraphError::TransactionFailed(e.to_string()))?;
        debug!("transaction started");
        Ok(SqliteTransaction {
            conn,
            finished: false,
        })
    }
}

/// Open SQLite transaction; owns the connection until finished
pub struct SqliteTransaction {
    conn: OwnedMutexGuard<rusqlite::Connection>,
    finished: bool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("finished", &self.finished)
            .finish()
    }
}

impl QueryExecutor for SqliteTransaction {
    async fn query(&self, stmt: &Statement) -> GraphResult<Vec<Row>> {
        run_query(&self.conn, stmt)
    }

    async fn execute(&self, stmt: &Statement) -> GraphResult<ExecOutcome> {
        run_execute(&self.conn, stmt)
    }
}

impl SchemaProvider for SqliteTransaction {
    async fn get_schema(&self, table: &str) -> GraphResult<TableSchema> {
        introspect(&self.conn, table)
    }
}

impl Transaction for SqliteTransaction {
    async fn commit(mut self) -> GraphResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| GraphError::TransactionFailed(e.to_string()))?;
        self.finished = true;
        debug!("transaction committed");
        Ok(())
    }

    async fn rollback(mut self) -> GraphResult<()> {
        self.finished = true;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| GraphError::TransactionFailed(e.to_string()))?;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

// -----------------------------------------------------------------------
// Internal helpers
// -----------------------------------------------------------------------

fn run_query(conn: &rusqlite::Connection, stmt: &Statement) -> GraphResult<Vec<Row>> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let names: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let params: Vec<SqlValue> = stmt.params.iter().map(json_to_sql).collect();

    let mut rows = prepared.query(params_from_iter(params.iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Map::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), sql_to_json(row.get_ref(i)?));
        }
        result.push(map);
    }

    debug!(sql = %stmt.sql, rows = result.len(), "query");
    Ok(result)
}

fn run_execute(conn: &rusqlite::Connection, stmt: &Statement) -> GraphResult<ExecOutcome> {
    let params: Vec<SqlValue> = stmt.params.iter().map(json_to_sql).collect();
    let affected = conn.execute(&stmt.sql, params_from_iter(params.iter()))?;

    let is_insert = stmt
        .sql
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"));

    debug!(sql = %stmt.sql, affected, "execute");
    Ok(ExecOutcome {
        rows_affected: affected as u64,
        last_insert_id: is_insert.then(|| conn.last_insert_rowid()),
    })
}

/// Describe a table from `PRAGMA table_info` and `PRAGMA foreign_key_list`
fn introspect(conn: &rusqlite::Connection, table: &str) -> GraphResult<TableSchema> {
    let quoted = quote_ident(table)?;

    let mut references: HashMap<String, ColumnRef> = HashMap::new();
    let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quoted))?;
    let mut fk_rows = fk_stmt.query([])?;
    while let Some(row) = fk_rows.next()? {
        let from: String = row.get("from")?;
        references.insert(
            from,
            ColumnRef {
                table: row.get("table")?,
                field: row.get("to")?,
            },
        );
    }

    let mut info_stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
    let mut info_rows = info_stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = info_rows.next()? {
        let name: String = row.get("name")?;
        let data_type: String = row.get("type")?;
        let not_null: i64 = row.get("notnull")?;
        let pk: i64 = row.get("pk")?;

        columns.push(ColumnDef {
            column_type: ColumnType::from_declared(&data_type),
            data_type,
            nullable: not_null == 0 && pk == 0,
            key: if pk > 0 { KeyRole::Primary } else { KeyRole::None },
            default: row.get("dflt_value")?,
            references: references.remove(&name),
            name,
        });
    }

    if columns.is_empty() {
        return Err(GraphError::SchemaNotFound(table.to_string()));
    }
    Ok(TableSchema::new(table, columns))
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(STANDARD.encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DDL: &str = "
        CREATE TABLE suppliers (id TEXT PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            stock INTEGER DEFAULT 0,
            supplier_id TEXT REFERENCES suppliers(id)
        );
        CREATE TABLE counters (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT);
    ";

    async fn db() -> SqliteDatabase {
        let db = SqliteDatabase::open_memory().unwrap();
        db.execute_batch(DDL).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_introspection() {
        let db = db().await;
        let schema = db.get_schema("products").await.unwrap();

        assert_eq!(schema.columns.len(), 4);
        assert_eq!(schema.primary_key().unwrap().name, "id");
        assert!(schema.primary_key().unwrap().column_type.is_textual());
        assert!(!schema.column("name").unwrap().nullable);
        assert_eq!(schema.column("stock").unwrap().default.as_deref(), Some("0"));

        let fk = schema.column("supplier_id").unwrap().references.clone().unwrap();
        assert_eq!(fk.table, "suppliers");
        assert_eq!(fk.field.as_deref(), Some("id"));
    }

    #[tokio::test]
    async fn test_unknown_table_is_schema_not_found() {
        let db = db().await;
        let err = db.get_schema("ghosts").await.unwrap_err();
        assert!(matches!(err, GraphError::SchemaNotFound(t) if t == "ghosts"));
    }

    #[tokio::test]
    async fn test_execute_and_query_values() {
        let db = db().await;
        let outcome = db
            .execute(&Statement::with_params(
                "INSERT INTO counters (label) VALUES (?)",
                vec![json!({"nested": true})],
            ))
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, Some(1));

        let rows = db
            .query(&Statement::new("SELECT id, label FROM counters"))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["label"], json!("{\"nested\":true}"));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = db().await;
        let tx = db.begin().await.unwrap();
        tx.execute(&Statement::with_params(
            "INSERT INTO suppliers (id, name) VALUES (?, ?)",
            vec![json!("s1"), json!("Acme")],
        ))
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let rows = db
            .query(&Statement::new("SELECT * FROM suppliers"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = db().await;
        {
            let tx = db.begin().await.unwrap();
            tx.execute(&Statement::with_params(
                "INSERT INTO suppliers (id, name) VALUES (?, ?)",
                vec![json!("s1"), json!("Acme")],
            ))
            .await
            .unwrap();
        }

        let rows = db
            .query(&Statement::new("SELECT * FROM suppliers"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_unique_violation_is_conflict() {
        let db = db().await;
        let insert = Statement::with_params(
            "INSERT INTO suppliers (id, name) VALUES (?, ?)",
            vec![json!("s1"), json!("Acme")],
        );
        db.execute(&insert).await.unwrap();
        let err = db.execute(&insert).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }
}
