//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::error::QueryError;

/// Page size used when pagination is disabled (`page_size=-1`)
pub const UNBOUNDED_PAGE_SIZE: usize = i32::MAX as usize;

/// Sentinel page size meaning "no pagination"
pub const NO_PAGINATION: i64 = -1;

/// What a leading `-` on a sort field means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortConvention {
    /// Fields sort ascending; `-field` sorts descending
    #[default]
    MinusDescending,
    /// Fields sort descending; `-field` sorts ascending
    MinusAscending,
}

/// How the list, count and aggregate queries of one request are run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

/// Settings of a [`QueryMapper`](crate::core::QueryMapper)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Page size when the request has no `page_size`; `-1` disables pagination
    pub default_page_size: i64,

    /// Meaning of the `-` sort prefix
    pub sort_convention: SortConvention,

    /// Run list, count and aggregate queries concurrently
    pub concurrent: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_page_size: NO_PAGINATION,
            sort_convention: SortConvention::default(),
            concurrent: false,
        }
    }
}

impl MapperConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapper config '{}'", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse mapper config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the default page size is `-1` or positive
    pub fn validate(&self) -> Result<(), QueryError> {
        self.resolved_default_page_size().map(|_| ())
    }

    /// Default page size with the `-1` sentinel mapped to [`UNBOUNDED_PAGE_SIZE`]
    pub fn resolved_default_page_size(&self) -> Result<usize, QueryError> {
        match self.default_page_size {
            NO_PAGINATION => Ok(UNBOUNDED_PAGE_SIZE),
            size if size >= 1 => Ok(usize::try_from(size)
                .unwrap_or(UNBOUNDED_PAGE_SIZE)
                .min(UNBOUNDED_PAGE_SIZE)),
            size => Err(QueryError::Config {
                message: format!("default_page_size must be -1 or at least 1, got {}", size),
            }),
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.concurrent {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        }
    }
}
