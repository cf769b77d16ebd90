//! Query Executor subsystem for aerograph
//!
//! Defines the statement/row types and the executor contract the engine
//! runs against, plus the SQLite implementation.
//!
//! # Invariants
//!
//! - Values always travel as bound parameters, never spliced into SQL
//! - A transaction owns its session; abandoning it rolls back

mod connection;
mod sqlite;
mod statement;

pub use connection::{Connection, Database, QueryExecutor, Transaction};
pub use sqlite::{SqliteDatabase, SqliteTransaction};
pub use statement::{ExecOutcome, Row, Statement};
