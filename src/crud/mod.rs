//! CRUD subsystem for aerograph
//!
//! Dynamic, schema-validated statements over a single table. This is the
//! only layer that builds SQL; the graph engines compose it.
//!
//! # Behavior
//!
//! - Unknown payload fields are dropped silently
//! - Textual primary keys are generated when absent on create
//! - `created_at`/`updated_at` are stamped when the table has them
//! - Soft-deleted rows are hidden from reads unless asked for

mod conditions;
mod primitive;
mod query;

pub use conditions::{Condition, Conditions, Operator, WhereClause};
pub use primitive::{primary_key_name, timestamp_now, Crud, DEFAULT_KEY_COLUMN};
pub use query::{is_blank, Direction, IdSelector, Pagination, ReadOutcome, ReadQuery, RecordKey};
