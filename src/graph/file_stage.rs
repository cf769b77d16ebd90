//! # Two-Phase Attachment Write
//!
//! The stages are distinct types so they can only run in order:
//!
//! ```text
//! PendingPlaceholder ──row write──▶ RowPersisted ──store──▶ FilePersisted ──update──▶ ReferenceUpdated
//! ```
//!
//! A row therefore never references a stored location before the file
//! exists, and no file is stored unless its row was written.

use serde_json::Value;

use crate::crud::{Crud, RecordKey};
use crate::errors::GraphResult;
use crate::executor::{Connection, Row};
use crate::file_storage::{FilePayload, FileStore};
use crate::model::FileAttachment;

/// Decoded payload waiting for its row
#[derive(Debug)]
pub(crate) struct PendingPlaceholder<'m> {
    attachment: &'m FileAttachment,
    payload: FilePayload,
}

impl<'m> PendingPlaceholder<'m> {
    pub(crate) fn new(attachment: &'m FileAttachment, payload: FilePayload) -> Self {
        Self {
            attachment,
            payload,
        }
    }

    /// Point the row's reference column at the placeholder
    pub(crate) fn mark(&self, row: &mut Row, placeholder: &str) {
        row.insert(
            self.attachment.column.clone(),
            Value::String(placeholder.to_string()),
        );
    }

    /// The row write succeeded; the entity id is now known
    pub(crate) fn row_persisted(self, entity_id: &Value) -> RowPersisted {
        RowPersisted {
            column: self.attachment.column.clone(),
            path: self.attachment.storage_path(entity_id, &self.payload),
            bytes: self.payload.bytes,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RowPersisted {
    column: String,
    path: String,
    bytes: Vec<u8>,
}

impl RowPersisted {
    pub(crate) async fn store(self, files: &FileStore) -> GraphResult<FilePersisted> {
        files.write(&self.path, self.bytes).await?;
        Ok(FilePersisted {
            column: self.column,
            path: self.path,
        })
    }
}

#[derive(Debug)]
pub(crate) struct FilePersisted {
    column: String,
    path: String,
}

impl FilePersisted {
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Narrow update setting only the reference column
    pub(crate) async fn update_reference<C: Connection>(
        self,
        crud: &Crud<'_, C>,
        table: &str,
        key: &RecordKey,
    ) -> GraphResult<ReferenceUpdated> {
        let mut data = Row::new();
        data.insert(self.column, Value::String(self.path.clone()));
        let row = crud.update(table, key, &data).await?;
        Ok(ReferenceUpdated {
            row,
            path: self.path,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ReferenceUpdated {
    pub(crate) row: Row,
    pub(crate) path: String,
}
