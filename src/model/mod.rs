//! # Entity Models
//!
//! Long-lived table bindings consumed by the graph engines.

mod attachment;
mod defaults;
mod entity;
mod validators;

pub use attachment::FileAttachment;
pub use defaults::{generators, DefaultValue, Producer};
pub use entity::{ChildRelation, EntityModel, EntityModelBuilder};
pub use validators::{FieldValidator, Predicate};
