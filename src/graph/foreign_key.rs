//! # Foreign-Key Resolution
//!
//! Finds the column on a child table that links it to its parent. The
//! strategies run in order and the first hit wins:
//!
//! 1. explicit column configured on the child relationship
//! 2. a child column whose schema `references` the parent's table
//! 3. the naming convention `<parent_entity_name>_id`

use crate::errors::{GraphError, GraphResult};
use crate::model::{ChildRelation, EntityModel};
use crate::schema::TableSchema;

/// Which strategy produced a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    SchemaReference,
    NamingConvention,
}

/// Resolved parent ↔ child link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column on the child table
    pub column: String,
    /// Parent column the link points at; `None` means the parent's key
    pub parent_field: Option<String>,
    pub source: KeySource,
}

/// Inputs available to a strategy
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub parent: &'a EntityModel,
    pub relation: &'a ChildRelation,
    pub child_schema: &'a TableSchema,
}

type Strategy = fn(&LinkContext<'_>) -> Option<ForeignKey>;

const STRATEGIES: [Strategy; 3] = [explicit, schema_reference, naming_convention];

fn explicit(ctx: &LinkContext<'_>) -> Option<ForeignKey> {
    let column = ctx.relation.foreign_key.clone()?;
    let parent_field = ctx
        .child_schema
        .column(&column)
        .and_then(|c| c.references.as_ref())
        .and_then(|r| r.field.clone());
    Some(ForeignKey {
        column,
        parent_field,
        source: KeySource::Explicit,
    })
}

fn schema_reference(ctx: &LinkContext<'_>) -> Option<ForeignKey> {
    let column = ctx.child_schema.columns_referencing(ctx.parent.table()).next()?;
    Some(ForeignKey {
        column: column.name.clone(),
        parent_field: column.references.as_ref().and_then(|r| r.field.clone()),
        source: KeySource::SchemaReference,
    })
}

fn naming_convention(ctx: &LinkContext<'_>) -> Option<ForeignKey> {
    let column = format!("{}_id", ctx.parent.entity_name());
    ctx.child_schema.has_column(&column).then_some(ForeignKey {
        column,
        parent_field: None,
        source: KeySource::NamingConvention,
    })
}

/// First strategy that finds a link, if any
pub fn resolve(ctx: &LinkContext<'_>) -> Option<ForeignKey> {
    STRATEGIES.iter().find_map(|strategy| strategy(ctx))
}

/// Like `resolve`, for callers that cannot proceed without a link
pub fn require(ctx: &LinkContext<'_>) -> GraphResult<ForeignKey> {
    resolve(ctx).ok_or_else(|| GraphError::UnresolvableForeignKey {
        parent: ctx.parent.table().to_string(),
        child: ctx.relation.table().to_string(),
    })
}
