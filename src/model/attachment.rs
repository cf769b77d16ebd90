//! File-attachment configuration of an entity model

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{GraphError, GraphResult};
use crate::file_storage::{FilePayload, FILE_TYPE_FIELD};

/// Which column holds a model's file reference and where files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Column storing the file's location
    pub column: String,
    /// Directory template; `{id}` is replaced by the entity id. Without a
    /// placeholder the id is appended as a final segment.
    pub location: String,
    /// Reject content that is not a recognised image
    pub images_only: bool,
    /// Allowed `_file_type` sub-folders; empty allows any
    pub file_types: Vec<String>,
    /// Per-model size cap overriding the engine default
    pub max_bytes: Option<u64>,
}

impl FileAttachment {
    pub fn new(column: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            location: location.into(),
            images_only: false,
            file_types: Vec::new(),
            max_bytes: None,
        }
    }

    pub fn images_only(mut self) -> Self {
        self.images_only = true;
        self
    }

    pub fn file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    /// Directory for an entity's files, optionally one level deeper by type
    pub fn directory(&self, entity_id: &Value, file_type: Option<&str>) -> String {
        let id = path_segment(entity_id);
        let template = self.location.trim_end_matches('/');
        let mut dir = if template.contains("{id}") {
            template.replace("{id}", &id)
        } else {
            format!("{}/{}", template, id)
        };
        if let Some(kind) = file_type {
            dir.push('/');
            dir.push_str(kind);
        }
        dir
    }

    /// Fresh storage path for `payload` under the entity's directory.
    ///
    /// Image-only attachments take the extension of the decoded format, not
    /// the one the caller named.
    pub fn storage_path(&self, entity_id: &Value, payload: &FilePayload) -> String {
        let extension = match payload.sniffed_extension() {
            Some(ext) if self.images_only => ext.to_string(),
            _ => payload.extension(),
        };
        format!(
            "{}/{}.{}",
            self.directory(entity_id, payload.file_type.as_deref()),
            Uuid::new_v4(),
            extension
        )
    }

    /// Size, content and type checks for an inline payload
    pub fn validate(&self, table: &str, payload: &FilePayload, default_max: u64) -> GraphResult<()> {
        let max = self.max_bytes.unwrap_or(default_max);
        if payload.bytes.len() as u64 > max {
            return Err(GraphError::validation(
                table,
                &self.column,
                format!("file exceeds {} bytes", max),
            ));
        }

        if self.images_only && !payload.is_image() {
            return Err(GraphError::validation(
                table,
                &self.column,
                "only image files are accepted",
            ));
        }

        if let Some(kind) = payload.file_type.as_deref() {
            let safe = kind
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !safe {
                return Err(GraphError::validation(table, FILE_TYPE_FIELD, "invalid file type"));
            }
            if !self.file_types.is_empty() && !self.file_types.iter().any(|t| t == kind) {
                return Err(GraphError::validation(
                    table,
                    FILE_TYPE_FIELD,
                    format!("unknown file type {}", kind),
                ));
            }
        }
        Ok(())
    }
}

/// Entity id as a single, separator-free path segment
fn path_segment(id: &Value) -> String {
    let raw = match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
