//! Per-entity metadata table
//!
//! Backends need each field's declared type to resolve raw values, and aggregate
//! queries need to know which fields carry an average alias. Both come from an
//! [`EntityMetadata`] supplied by the caller, typically loaded from YAML next to the
//! mapper configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::error::QueryError;
use crate::core::field::{FieldDescriptor, FieldType};

/// Declared fields of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity type name (e.g., "order")
    pub name: String,

    /// Fields in declaration order; this is also the default projection
    pub fields: Vec<FieldDescriptor>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, builder style
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Shorthand for a field with no variants and no alias
    pub fn typed(self, name: &str, field_type: FieldType) -> Self {
        self.field(FieldDescriptor::new(name, field_type))
    }

    /// Load metadata from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let metadata: Self =
            serde_yaml::from_str(yaml).context("Failed to parse entity metadata")?;
        Ok(metadata)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Look up a field, failing with [`QueryError::UnknownField`]
    pub fn require(&self, name: &str) -> Result<&FieldDescriptor, QueryError> {
        self.get(name).ok_or_else(|| QueryError::UnknownField {
            entity: self.name.clone(),
            field: name.to_string(),
        })
    }

    /// All declared field names, in order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    /// Replace each attribute by its declared average alias, if it has one
    ///
    /// Unknown attributes are kept as-is; the backend reports them when it reads the row.
    pub fn avg_aliases(&self, attributes: &[String]) -> Vec<String> {
        attributes
            .iter()
            .map(|attribute| {
                self.get(attribute)
                    .and_then(|field| field.avg_alias.clone())
                    .unwrap_or_else(|| attribute.clone())
            })
            .collect()
    }
}
