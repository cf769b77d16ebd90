//! aerograph - Schema-aware recursive object-graph persistence
//!
//! Nested create/read/update/delete over relational tables, driven by
//! runtime-introspected schemas and a tree of entity models.

pub mod config;
pub mod crud;
pub mod errors;
pub mod executor;
pub mod file_storage;
pub mod graph;
pub mod model;
pub mod observability;
pub mod schema;

pub use config::EngineConfig;
pub use errors::{GraphError, GraphResult};
pub use graph::{GraphAction, GraphEngine, GraphOptions, RequestGraph, ResultGraph};
pub use model::EntityModel;
