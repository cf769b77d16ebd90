//! # Entity Model
//!
//! Binds one table to its key, validators, defaults, attachment config and
//! child relationships. Models are assembled once with the builder and
//! shared immutably (`Arc`) afterwards; the same child model may appear
//! under several parents.

use std::sync::Arc;

use serde_json::Value;

use super::attachment::FileAttachment;
use super::defaults::DefaultValue;
use super::validators::FieldValidator;
use crate::crud::{is_blank, primary_key_name};
use crate::errors::{GraphError, GraphResult};
use crate::executor::Row;
use crate::schema::TableSchema;

/// Parent → child link
#[derive(Debug, Clone)]
pub struct ChildRelation {
    pub model: Arc<EntityModel>,
    /// Linking column on the child table, when not inferred
    pub foreign_key: Option<String>,
}

impl ChildRelation {
    pub fn table(&self) -> &str {
        self.model.table()
    }
}

/// Table binding
#[derive(Debug)]
pub struct EntityModel {
    table: String,
    entity_name: String,
    primary_key: Option<String>,
    required: Vec<String>,
    validators: Vec<(String, FieldValidator)>,
    defaults: Vec<(String, DefaultValue)>,
    attachment: Option<FileAttachment>,
    children: Vec<ChildRelation>,
}

impl EntityModel {
    pub fn builder(table: impl Into<String>) -> EntityModelBuilder {
        EntityModelBuilder::new(table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Singular name used for `<entity>_id` foreign-key inference
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn attachment(&self) -> Option<&FileAttachment> {
        self.attachment.as_ref()
    }

    pub fn children(&self) -> &[ChildRelation] {
        &self.children
    }

    pub fn child(&self, table: &str) -> Option<&ChildRelation> {
        self.children.iter().find(|c| c.table() == table)
    }

    /// Primary key: explicit config, else schema-flagged, else `id`
    pub fn primary_key(&self, schema: &TableSchema) -> String {
        self.primary_key
            .clone()
            .unwrap_or_else(|| primary_key_name(schema))
    }

    /// Model bound to `table`: self, then direct children, then a
    /// depth-first search of the tree
    pub fn find_model(&self, table: &str) -> Option<&EntityModel> {
        if self.table == table {
            return Some(self);
        }
        if let Some(child) = self.child(table) {
            return Some(&child.model);
        }
        self.children
            .iter()
            .find_map(|child| child.model.find_model(table))
    }

    /// Fill fields the row lacks (or carries as null) from the model defaults
    pub fn apply_defaults(&self, row: &mut Row) {
        for (field, default) in &self.defaults {
            let missing = row.get(field).map_or(true, Value::is_null);
            if missing {
                row.insert(field.clone(), default.produce());
            }
        }
    }

    /// Check required fields and validators.
    ///
    /// On create every rule applies. On update only the fields present in
    /// the payload are checked, so partial updates pass.
    pub fn validate(&self, row: &Row, creating: bool) -> GraphResult<()> {
        for field in &self.required {
            let value = row.get(field);
            let violated = match value {
                Some(v) => is_blank(v),
                None => creating,
            };
            if violated {
                return Err(GraphError::validation(&self.table, field, "is required"));
            }
        }

        for (field, validator) in &self.validators {
            let value = row.get(field);
            if value.is_none() && !creating {
                continue;
            }
            validator
                .check(value)
                .map_err(|reason| GraphError::validation(&self.table, field, reason))?;
        }
        Ok(())
    }
}

/// Builder for `EntityModel`
#[derive(Debug)]
pub struct EntityModelBuilder {
    model: EntityModel,
}

impl EntityModelBuilder {
    fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let entity_name = singular(&table);
        Self {
            model: EntityModel {
                table,
                entity_name,
                primary_key: None,
                required: Vec::new(),
                validators: Vec::new(),
                defaults: Vec::new(),
                attachment: None,
                children: Vec::new(),
            },
        }
    }

    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.model.entity_name = name.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.model.primary_key = Some(column.into());
        self
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model.required.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn validate(mut self, field: impl Into<String>, validator: FieldValidator) -> Self {
        self.model.validators.push((field.into(), validator));
        self
    }

    pub fn default_value(mut self, field: impl Into<String>, value: DefaultValue) -> Self {
        self.model.defaults.push((field.into(), value));
        self
    }

    pub fn attachment(mut self, attachment: FileAttachment) -> Self {
        self.model.attachment = Some(attachment);
        self
    }

    /// Child linked by an inferred foreign key
    pub fn child(mut self, model: Arc<EntityModel>) -> Self {
        self.model.children.push(ChildRelation {
            model,
            foreign_key: None,
        });
        self
    }

    /// Child linked by an explicit foreign-key column
    pub fn child_with_key(mut self, model: Arc<EntityModel>, foreign_key: impl Into<String>) -> Self {
        self.model.children.push(ChildRelation {
            model,
            foreign_key: Some(foreign_key.into()),
        });
        self
    }

    pub fn build(self) -> Arc<EntityModel> {
        Arc::new(self.model)
    }
}

fn singular(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = table.strip_suffix('s') {
        stem.to_string()
    } else {
        table.to_string()
    }
}
