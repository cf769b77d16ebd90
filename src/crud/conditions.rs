//! # Condition DSL
//!
//! Small filter language compiled to a parameterised WHERE clause:
//! - scalar: equality
//! - `null`: IS NULL
//! - array: IN (an empty list matches nothing)
//! - operator map: `$gt $gte $lt $lte $ne $like $startsWith $endsWith`
//!
//! `$like`, `$startsWith` and `$endsWith` compile to LIKE with the wildcard
//! on both sides, at the end, and at the start respectively.

use serde_json::{Map, Value};

use crate::errors::{GraphError, GraphResult};
use crate::schema::{quote_ident, ColumnSet};

/// Comparison operators of an operator map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    Like,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse a `$name` key
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$ne" => Some(Operator::Ne),
            "$like" => Some(Operator::Like),
            "$startsWith" => Some(Operator::StartsWith),
            "$endsWith" => Some(Operator::EndsWith),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Ne => "<>",
            Operator::Like | Operator::StartsWith | Operator::EndsWith => "LIKE",
        }
    }
}

/// Condition on a single column
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    IsNull,
    In(Vec<Value>),
    Ops(Vec<(Operator, Value)>),
}

impl Condition {
    /// Interpret a JSON condition value
    pub fn from_value(value: &Value) -> GraphResult<Self> {
        match value {
            Value::Null => Ok(Condition::IsNull),
            Value::Array(items) => Ok(Condition::In(items.clone())),
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                let mut ops = Vec::with_capacity(map.len());
                for (key, operand) in map {
                    let op = Operator::parse(key).ok_or_else(|| {
                        GraphError::InvalidPayload(format!("unknown condition operator {}", key))
                    })?;
                    ops.push((op, operand.clone()));
                }
                Ok(Condition::Ops(ops))
            }
            other => Ok(Condition::Eq(other.clone())),
        }
    }
}

/// Accumulates WHERE fragments and their parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    parts: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    pub fn push(&mut self, sql: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.parts.push(sql.into());
        self.params.extend(params);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// ` WHERE a AND b`, or empty
    pub fn sql(&self) -> String {
        if self.parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.parts.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Add an IN list; an empty list matches nothing
    pub fn push_in(&mut self, quoted_column: &str, values: &[Value]) {
        if values.is_empty() {
            self.push("1 = 0", []);
            return;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.push(
            format!("{} IN ({})", quoted_column, placeholders),
            values.iter().cloned(),
        );
    }
}

/// Ordered set of column conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Condition)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{column: condition}` map
    pub fn from_json(map: &Map<String, Value>) -> GraphResult<Self> {
        let mut conditions = Self::new();
        for (field, value) in map {
            conditions
                .entries
                .push((field.clone(), Condition::from_value(value)?));
        }
        Ok(conditions)
    }

    /// Add an equality condition
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with(field, Condition::Eq(value))
    }

    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.entries.push((field.into(), condition));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any condition names `field`
    pub fn mentions(&self, field: &str) -> bool {
        self.entries.iter().any(|(f, _)| f == field)
    }

    /// Append conditions on known columns to `clause`; unknown columns are dropped
    pub fn compile(&self, columns: &ColumnSet, clause: &mut WhereClause) -> GraphResult<()> {
        for (field, condition) in &self.entries {
            if !columns.contains(field) {
                continue;
            }
            let column = quote_ident(field)?;
            match condition {
                Condition::Eq(value) => clause.push(format!("{} = ?", column), [value.clone()]),
                Condition::IsNull => clause.push(format!("{} IS NULL", column), []),
                Condition::In(values) => clause.push_in(&column, values),
                Condition::Ops(ops) => {
                    for (op, operand) in ops {
                        compile_op(&column, *op, operand, clause);
                    }
                }
            }
        }
        Ok(())
    }
}

fn compile_op(column: &str, op: Operator, operand: &Value, clause: &mut WhereClause) {
    match (op, operand) {
        (Operator::Ne, Value::Null) => clause.push(format!("{} IS NOT NULL", column), []),
        (Operator::Like | Operator::StartsWith | Operator::EndsWith, _) => {
            let text = match operand {
                Value::String(s) => escape_like(s),
                other => escape_like(&other.to_string()),
            };
            let pattern = match op {
                Operator::StartsWith => format!("{}%", text),
                Operator::EndsWith => format!("%{}", text),
                _ => format!("%{}%", text),
            };
            clause.push(
                format!("{} LIKE ? ESCAPE '\\'", column),
                [Value::String(pattern)],
            );
        }
        _ => clause.push(format!("{} {} ?", column, op.sql()), [operand.clone()]),
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
