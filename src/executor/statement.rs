//! Parameterised statements and result rows

use serde_json::{Map, Value};

/// A result row: column name to JSON value
pub type Row = Map<String, Value>;

/// SQL text plus positional (`?`) parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Statement with parameters
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append one parameter
    pub fn bind(mut self, value: Value) -> Self {
        self.params.push(value);
        self
    }
}

/// Outcome of a non-query statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Row id assigned by the database to the last insert, if any
    pub last_insert_id: Option<i64>,
}
