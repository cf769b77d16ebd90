//! # Graph Engine Errors
//!
//! Uniform error type for the schema provider, CRUD primitive and the
//! recursive graph engines. Every error carries a human message and an
//! HTTP-style status so the surrounding application can surface it as-is.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::file_storage::StorageError;

/// Result type for graph engine operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Coarse classification of an error's status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Caller input problem (4xx)
    ClientError,
    /// Infrastructure problem (5xx)
    ServerError,
}

/// Graph engine errors
#[derive(Debug, Error)]
pub enum GraphError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Payload and schema share no writable column
    #[error("No valid columns for table {0}")]
    NoValidColumns(String),

    /// Update/delete invoked without an identifier
    #[error("Missing id for table {0}")]
    MissingId(String),

    /// A row selected for update carries no primary-key value
    #[error("Missing primary key '{field}' for table {table}")]
    MissingPrimaryKey { table: String, field: String },

    /// Row does not exist
    #[error("Record not found in {table}: {id}")]
    RecordNotFound { table: String, id: String },

    /// A field failed a model validator
    #[error("Validation failed for {table}.{field}: {reason}")]
    ValidationFailed {
        table: String,
        field: String,
        reason: String,
    },

    /// Request graph names a table no model is bound to
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Requested action is not create/update/read/delete
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Request graph or condition payload is malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Unique constraint violated (e.g. two racing creates of the same key)
    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Schema provider returned no columns
    #[error("Schema not found for table {0}")]
    SchemaNotFound(String),

    /// No linking column between a parent and child table
    #[error("Cannot resolve foreign key from {child} to {parent}")]
    UnresolvableForeignKey { parent: String, child: String },

    /// Attachment could not be written
    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    /// Attachment could not be read
    #[error("Storage read failed: {0}")]
    StorageReadFailed(String),

    /// Begin/commit/rollback failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Statement execution failed
    #[error("Database error: {0}")]
    Database(String),

    // ==================
    // Context
    // ==================
    /// Error raised while processing a specific table/action
    #[error("{action} on {table} failed: {source}")]
    Operation {
        table: String,
        action: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Shorthand for a validation failure
    pub fn validation(
        table: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GraphError::ValidationFailed {
            table: table.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Attach the failing table/action. Already-wrapped errors keep their
    /// innermost context.
    pub fn in_table(self, table: &str, action: impl fmt::Display) -> Self {
        match self {
            GraphError::Operation { .. } => self,
            other => GraphError::Operation {
                table: table.to_string(),
                action: action.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::Operation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::NoValidColumns(_) => 400,
            GraphError::MissingId(_) => 400,
            GraphError::MissingPrimaryKey { .. } => 400,
            GraphError::RecordNotFound { .. } => 404,
            GraphError::ValidationFailed { .. } => 422,
            GraphError::UnknownTable(_) => 400,
            GraphError::UnknownAction(_) => 400,
            GraphError::InvalidPayload(_) => 400,
            GraphError::Conflict(_) => 409,
            GraphError::SchemaNotFound(_) => 500,
            GraphError::UnresolvableForeignKey { .. } => 500,
            GraphError::StorageWriteFailed(_) => 500,
            GraphError::StorageReadFailed(_) => 500,
            GraphError::TransactionFailed(_) => 500,
            GraphError::Database(_) => 500,
            GraphError::Operation { source, .. } => source.status_code(),
        }
    }

    /// 4xx vs 5xx
    pub fn status_class(&self) -> StatusClass {
        if self.status_code() < 500 {
            StatusClass::ClientError
        } else {
            StatusClass::ServerError
        }
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && matches!(
                        e.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                GraphError::Conflict(err.to_string())
            }
            _ => GraphError::Database(err.to_string()),
        }
    }
}

impl From<StorageError> for GraphError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound(_) | StorageError::ReadFailed(_) => {
                GraphError::StorageReadFailed(err.to_string())
            }
            _ => GraphError::StorageWriteFailed(err.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

impl From<&GraphError> for ErrorBody {
    fn from(err: &GraphError) -> Self {
        Self {
            code: err.status_code(),
            error: err.to_string(),
        }
    }
}
