//! Query executor contract
//!
//! The engine needs exactly two primitives from its environment: run a
//! parameterised statement (optionally inside a transaction) and describe
//! a table. A `Connection` is anything offering both; a `Database` can
//! additionally open a `Transaction`, which is itself a `Connection` that
//! owns its session until commit or rollback.

use super::statement::{ExecOutcome, Row, Statement};
use crate::errors::GraphResult;
use crate::schema::SchemaProvider;

/// Runs parameterised statements
#[allow(async_fn_in_trait)]
pub trait QueryExecutor {
    /// Run a statement that returns rows
    async fn query(&self, stmt: &Statement) -> GraphResult<Vec<Row>>;

    /// Run a statement that returns an affected count
    async fn execute(&self, stmt: &Statement) -> GraphResult<ExecOutcome>;
}

/// Statement execution plus schema introspection
pub trait Connection: QueryExecutor + SchemaProvider {}

impl<T: QueryExecutor + SchemaProvider> Connection for T {}

/// Open transaction handle.
///
/// Dropping a handle without calling `commit` aborts the transaction.
#[allow(async_fn_in_trait)]
pub trait Transaction: Connection + Sized {
    async fn commit(self) -> GraphResult<()>;

    async fn rollback(self) -> GraphResult<()>;
}

/// A connection that can begin transactions
#[allow(async_fn_in_trait)]
pub trait Database: Connection {
    type Tx: Transaction;

    async fn begin(&self) -> GraphResult<Self::Tx>;
}
