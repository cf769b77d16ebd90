//! Result graphs returned by the engines

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::GraphAction;
use crate::executor::Row;

/// Rows written by a create/update call, keyed by table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteResult {
    #[serde(rename = "createData")]
    pub create_data: BTreeMap<String, Vec<Row>>,
    #[serde(rename = "updateData")]
    pub update_data: BTreeMap<String, Vec<Row>>,
}

impl WriteResult {
    pub(crate) fn record(&mut self, action: GraphAction, table: &str, row: Row) {
        let bucket = match action {
            GraphAction::Update => &mut self.update_data,
            _ => &mut self.create_data,
        };
        bucket.entry(table.to_string()).or_default().push(row);
    }

    pub fn created(&self, table: &str) -> &[Row] {
        self.create_data.get(table).map_or(&[], Vec::as_slice)
    }

    pub fn updated(&self, table: &str) -> &[Row] {
        self.update_data.get(table).map_or(&[], Vec::as_slice)
    }
}

/// Branch of a read that could not be hydrated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchError {
    pub table: String,
    /// Key of the row the branch hangs off; `None` at the top level
    pub parent_id: Option<Value>,
    pub message: String,
}

/// Hydrated rows keyed by top-level table, children embedded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadResult {
    pub data: BTreeMap<String, Vec<Row>>,
    pub errors: Vec<BranchError>,
}

impl ReadResult {
    pub fn rows(&self, table: &str) -> &[Row] {
        self.data.get(table).map_or(&[], Vec::as_slice)
    }
}

/// Outcome of one queued delete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    pub fn deleted(id: Value) -> Self {
        Self {
            id,
            status: Some("deleted".to_string()),
            error: None,
        }
    }

    pub fn failed(id: Value, error: impl Into<String>) -> Self {
        Self {
            id,
            status: None,
            error: Some(error.into()),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item delete outcomes keyed by table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteResult {
    #[serde(rename = "deleteData")]
    pub delete_data: BTreeMap<String, Vec<DeleteOutcome>>,
}

impl DeleteResult {
    pub(crate) fn record(&mut self, table: &str, outcome: DeleteOutcome) {
        self.delete_data
            .entry(table.to_string())
            .or_default()
            .push(outcome);
    }

    pub fn outcomes(&self, table: &str) -> &[DeleteOutcome] {
        self.delete_data.get(table).map_or(&[], Vec::as_slice)
    }

    /// Ids deleted from `table`
    pub fn deleted_ids(&self, table: &str) -> Vec<&Value> {
        self.outcomes(table)
            .iter()
            .filter(|o| o.is_deleted())
            .map(|o| &o.id)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.delete_data
            .values()
            .flatten()
            .any(|o| !o.is_deleted())
    }
}

/// Output of `GraphEngine::process_graph_operation`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultGraph {
    Write(WriteResult),
    Read(ReadResult),
    Delete(DeleteResult),
}
