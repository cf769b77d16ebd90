//! Table schema type definitions
//!
//! A `TableSchema` is the ordered column list reported by a schema
//! provider. Column types are classified from the declared SQL type:
//! - TEXT/CHAR/CLOB/VARCHAR/UUID: textual
//! - INT: integer
//! - REAL/FLOA/DOUB/NUMERIC/DECIMAL: real
//! - BOOL: boolean
//! - DATE/TIME: timestamp
//! - BLOB: blob
//! - JSON: json

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Logical column type derived from the declared SQL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Blob,
    Json,
    Other,
}

impl ColumnType {
    /// Classify a declared SQL type string
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("JSON") {
            ColumnType::Json
        } else if upper.contains("DATE") || upper.contains("TIME") {
            ColumnType::Timestamp
        } else if upper.contains("CHAR")
            || upper.contains("TEXT")
            || upper.contains("CLOB")
            || upper.contains("UUID")
        {
            ColumnType::Text
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            ColumnType::Real
        } else if upper.contains("BLOB") {
            ColumnType::Blob
        } else {
            ColumnType::Other
        }
    }

    /// Whether values of this type are strings (identifier generation uses UUIDs)
    pub fn is_textual(self) -> bool {
        matches!(self, ColumnType::Text)
    }
}

/// Role a column plays in the table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    #[default]
    None,
    Primary,
}

/// Foreign-key target of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Referenced table
    pub table: String,
    /// Referenced column; `None` means the referenced table's primary key
    pub field: Option<String>,
}

/// Single column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Declared SQL type, as reported by the database
    pub data_type: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub key: KeyRole,
    /// Default expression, if any
    pub default: Option<String>,
    pub references: Option<ColumnRef>,
}

impl ColumnDef {
    /// Create a nullable, non-key column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            column_type: ColumnType::from_declared(&data_type),
            data_type,
            nullable: true,
            key: KeyRole::None,
            default: None,
            references: None,
        }
    }

    /// Mark as primary key
    pub fn primary(mut self) -> Self {
        self.key = KeyRole::Primary;
        self.nullable = false;
        self
    }

    /// Mark as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Attach a foreign-key hint
    pub fn references(mut self, table: impl Into<String>, field: Option<&str>) -> Self {
        self.references = Some(ColumnRef {
            table: table.into(),
            field: field.map(str::to_string),
        });
        self
    }

    pub fn is_primary(&self) -> bool {
        self.key == KeyRole::Primary
    }
}

/// Ordered column list of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// First schema-flagged primary-key column
    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.is_primary())
    }

    /// Columns whose foreign-key hint points at `table`
    pub fn columns_referencing<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ColumnDef> {
        self.columns.iter().filter(move |c| {
            c.references
                .as_ref()
                .is_some_and(|r| r.table.eq_ignore_ascii_case(table))
        })
    }

    /// Column-name set for payload filtering
    pub fn column_set(&self) -> ColumnSet {
        ColumnSet {
            names: self.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

/// Set of column names a payload is intersected against.
///
/// Fields outside the set are dropped, never rejected: sibling arrays of a
/// nested payload must not leak into an unrelated table's statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    names: HashSet<String>,
}

impl ColumnSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Copy of `data` restricted to known columns
    pub fn filter(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .filter(|(k, _)| self.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Names in `data` that are not columns
    pub fn unknown_fields<'a>(&self, data: &'a Map<String, Value>) -> Vec<&'a str> {
        data.keys()
            .filter(|k| !self.contains(k))
            .map(String::as_str)
            .collect()
    }
}
