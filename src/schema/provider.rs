//! Schema provider contract and per-call cache

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::types::TableSchema;
use crate::errors::GraphResult;

/// Source of column metadata for a table.
///
/// Implementations fail with `GraphError::SchemaNotFound` when the table
/// has no columns.
#[allow(async_fn_in_trait)]
pub trait SchemaProvider {
    async fn get_schema(&self, table: &str) -> GraphResult<TableSchema>;
}

/// Memoises schema lookups for one engine call.
///
/// The engine never relies on caching for correctness; with caching
/// disabled every lookup goes to the provider.
#[derive(Debug, Default)]
pub struct SchemaCache {
    enabled: bool,
    entries: RefCell<HashMap<String, Rc<TableSchema>>>,
}

impl SchemaCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Fetch a schema, consulting the cache first
    pub async fn get<P: SchemaProvider>(
        &self,
        provider: &P,
        table: &str,
    ) -> GraphResult<Rc<TableSchema>> {
        if self.enabled {
            if let Some(schema) = self.entries.borrow().get(table) {
                return Ok(Rc::clone(schema));
            }
        }

        let schema = Rc::new(provider.get_schema(table).await?);
        debug!(table, columns = schema.columns.len(), "schema loaded");

        if self.enabled {
            self.entries
                .borrow_mut()
                .insert(table.to_string(), Rc::clone(&schema));
        }
        Ok(schema)
    }

    /// Number of memoised tables
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphError;
    use crate::schema::ColumnDef;
    use std::cell::Cell;

    struct CountingProvider {
        calls: Cell<usize>,
    }

    impl SchemaProvider for CountingProvider {
        async fn get_schema(&self, table: &str) -> GraphResult<TableSchema> {
            self.calls.set(self.calls.get() + 1);
            if table == "missing" {
                return Err(GraphError::SchemaNotFound(table.to_string()));
            }
            Ok(TableSchema::new(table, vec![ColumnDef::new("id", "TEXT").primary()]))
        }
    }

    #[tokio::test]
    async fn test_cache_hits_provider_once() {
        let provider = CountingProvider { calls: Cell::new(0) };
        let cache = SchemaCache::new(true);

        cache.get(&provider, "products").await.unwrap();
        cache.get(&provider, "products").await.unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_requeries() {
        let provider = CountingProvider { calls: Cell::new(0) };
        let cache = SchemaCache::new(false);

        cache.get(&provider, "products").await.unwrap();
        cache.get(&provider, "products").await.unwrap();

        assert_eq!(provider.calls.get(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let provider = CountingProvider { calls: Cell::new(0) };
        let cache = SchemaCache::new(true);

        assert!(cache.get(&provider, "missing").await.is_err());
        assert!(cache.get(&provider, "missing").await.is_err());
        assert_eq!(provider.calls.get(), 2);
    }
}
