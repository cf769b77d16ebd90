//! Schema subsystem for aerograph
//!
//! Column metadata drives every statement the engine builds: payloads are
//! intersected against the column set, primary keys and timestamp columns
//! are discovered here, and `references` hints feed foreign-key inference.
//!
//! # Design Principles
//!
//! - Unknown payload fields are dropped, not errored
//! - A table with no columns is `SchemaNotFound`
//! - Identifiers are validated before they reach SQL

mod ident;
mod provider;
mod types;

pub use ident::{is_valid_ident, quote_ident};
pub use provider::{SchemaCache, SchemaProvider};
pub use types::{ColumnDef, ColumnRef, ColumnSet, ColumnType, KeyRole, TableSchema};
