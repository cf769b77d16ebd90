//! # Read Queries
//!
//! `ReadQuery` selects either one row by scalar id (no pagination) or a
//! page of rows by id list and/or conditions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::conditions::Conditions;
use crate::executor::Row;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Parse "asc"/"desc" case-insensitively; anything else is ascending
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

/// Identifier selection mode
#[derive(Debug, Clone, PartialEq)]
pub enum IdSelector {
    /// Single-row mode
    Single(Value),
    /// IN mode, paginated
    Many(Vec<Value>),
}

/// Row key for update/delete
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKey {
    /// Value of the table's primary key (schema-flagged, else `id`)
    Single(Value),
    /// Column → value map, for composite or explicitly named keys
    Composite(Map<String, Value>),
}

impl RecordKey {
    /// Key on an explicitly named column
    pub fn column(name: impl Into<String>, value: Value) -> Self {
        let mut map = Map::new();
        map.insert(name.into(), value);
        RecordKey::Composite(map)
    }

    /// True when no usable identifier is present
    pub fn is_missing(&self) -> bool {
        match self {
            RecordKey::Single(value) => is_blank(value),
            RecordKey::Composite(map) => map.is_empty() || map.values().any(is_blank),
        }
    }

    /// Human-readable form for error messages
    pub fn describe(&self) -> String {
        match self {
            RecordKey::Single(Value::String(s)) => s.clone(),
            RecordKey::Single(value) => value.to_string(),
            RecordKey::Composite(map) => Value::Object(map.clone()).to_string(),
        }
    }
}

impl From<Value> for RecordKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RecordKey::Composite(map),
            other => RecordKey::Single(other),
        }
    }
}

/// Null or empty string
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Read parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadQuery {
    pub id: Option<IdSelector>,
    /// Column `id` selects on; defaults to the schema primary key
    pub key_column: Option<String>,
    pub conditions: Conditions,
    /// Projection; unknown names are dropped, empty means all columns
    pub fields: Option<Vec<String>>,
    pub order_by: Option<String>,
    pub direction: Direction,
    /// 1-based page number
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Include soft-deleted rows
    pub with_deleted: bool,
}

impl ReadQuery {
    /// All rows (subject to conditions/pagination)
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Value) -> Self {
        Self {
            id: Some(IdSelector::Single(id)),
            ..Self::default()
        }
    }

    pub fn by_ids(ids: Vec<Value>) -> Self {
        Self {
            id: Some(IdSelector::Many(ids)),
            ..Self::default()
        }
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(column.into());
        self.direction = direction;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Whether paging was requested explicitly
    pub fn is_paged(&self) -> bool {
        self.page.is_some() || self.limit.is_some()
    }
}

/// Page metadata of a multi-row read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.limit
    }
}

/// Result of a CRUD read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Scalar-id mode; `None` when absent
    Record(Option<Row>),
    /// Id-list or conditions mode
    Records {
        records: Vec<Row>,
        pagination: Pagination,
    },
}

impl ReadOutcome {
    /// The single record, or the first of a page
    pub fn into_record(self) -> Option<Row> {
        match self {
            ReadOutcome::Record(record) => record,
            ReadOutcome::Records { records, .. } => records.into_iter().next(),
        }
    }

    /// All returned rows
    pub fn into_records(self) -> Vec<Row> {
        match self {
            ReadOutcome::Record(record) => record.into_iter().collect(),
            ReadOutcome::Records { records, .. } => records,
        }
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        match self {
            ReadOutcome::Record(_) => None,
            ReadOutcome::Records { pagination, .. } => Some(pagination),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pagination_math() {
        let page = Pagination::new(3, 10, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 20);
        assert_eq!(Pagination::new(1, 0, 0).total_pages, 0);
    }

    #[test]
    fn test_record_key() {
        assert!(RecordKey::Single(json!(null)).is_missing());
        assert!(RecordKey::Single(json!("")).is_missing());
        assert!(!RecordKey::Single(json!(0)).is_missing());
        assert!(RecordKey::Composite(Map::new()).is_missing());

        let key = RecordKey::from(json!({"order_id": 1, "line": 2}));
        assert!(matches!(key, RecordKey::Composite(ref m) if m.len() == 2));
        assert_eq!(RecordKey::column("sku", json!("A-1")).describe(), "{\"sku\":\"A-1\"}");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("DESC"), Direction::Desc);
        assert_eq!(Direction::parse("sideways"), Direction::Asc);
    }
}
