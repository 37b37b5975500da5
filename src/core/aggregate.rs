//! Aggregate expressions: `sum=amount,tax[region,year]`
//!
//! The part before the first `[` is the attribute list, the optional bracketed suffix
//! is the group-by list. Brackets do not nest.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::core::entity::EntityMetadata;
use crate::core::error::QueryError;

/// Separator of attribute, group-by and sort lists
pub const LIST_SEPARATOR: char = ',';

/// Aggregate function applied to the attribute list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Sum,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Avg => write!(f, "avg"),
        }
    }
}

/// Parsed `sum` / `avg` directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateExpression {
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
}

impl AggregateExpression {
    /// Parse `raw`, reporting failures against the request parameter `key`
    pub fn parse(key: &str, raw: &str) -> Result<Self, QueryError> {
        static EXPRESSION: OnceLock<Regex> = OnceLock::new();
        let regex = EXPRESSION.get_or_init(|| {
            Regex::new(r"^(?P<attributes>[^\[]*)(?:\[(?P<group_by>.*)\])?")
                .expect("aggregate pattern is valid")
        });

        let invalid = || QueryError::InvalidAggregateSyntax {
            key: key.to_string(),
            value: raw.to_string(),
        };

        let captures = regex.captures(raw).ok_or_else(invalid)?;
        let attributes = captures
            .name("attributes")
            .map(|m| split_list(m.as_str()))
            .unwrap_or_default();
        if attributes.is_empty() {
            return Err(invalid());
        }

        let group_by = captures
            .name("group_by")
            .map(|m| split_list(m.as_str()))
            .filter(|group_by| !group_by.is_empty());

        Ok(Self {
            attributes,
            group_by,
        })
    }

    pub fn is_grouped(&self) -> bool {
        self.group_by.is_some()
    }

    /// Fields a result row of this aggregate carries: group-by fields first, then the
    /// aggregated attributes, with averaged attributes replaced by their aliases
    pub fn all_fields(&self, function: AggregateFunction, metadata: &EntityMetadata) -> Vec<String> {
        let attributes = match function {
            AggregateFunction::Sum => self.attributes.clone(),
            AggregateFunction::Avg => metadata.avg_aliases(&self.attributes),
        };

        match &self.group_by {
            Some(group_by) => group_by.iter().cloned().chain(attributes).collect(),
            None => attributes,
        }
    }
}

/// Comma-split a list, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
