//! Query parameters, the assembled query spec and pagination utilities
//!
//! [`QueryMapper::assemble`] turns the flat parameter map of one request into a
//! [`QuerySpec`]:
//!
//! ```text
//! GET /orders?status=OPEN|^pending&price=<>1000&sorting=-created,id&page=3&page_size=20
//!            &sum=amount[region]&count
//! ```
//!
//! Reserved keys (`page`, `page_size`, `sorting`, `attributes`, `distinct`, `count`,
//! `sum`, `total`, `totalAttributes`, `avg`) configure the query; every other key is a
//! filter clause. Assembly is all-or-nothing: the first bad clause fails the whole spec.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{MapperConfig, NO_PAGINATION, SortConvention, UNBOUNDED_PAGE_SIZE};
use crate::core::aggregate::{AggregateExpression, split_list};
use crate::core::clause::{ClauseParser, FilterClause};
use crate::core::convert::ConversionChain;
use crate::core::error::QueryError;
use crate::core::operator::OperatorRegistry;

pub const PAGE: &str = "page";
pub const PAGE_SIZE: &str = "page_size";
pub const SORTING: &str = "sorting";
pub const ATTRIBUTES: &str = "attributes";
pub const DISTINCT: &str = "distinct";
pub const COUNT: &str = "count";
pub const SUM: &str = "sum";
pub const TOTAL: &str = "total";
pub const TOTAL_ATTRIBUTES: &str = "totalAttributes";
pub const AVG: &str = "avg";

/// Keys that configure the query instead of filtering it
pub const RESERVED_KEYS: [&str; 10] = [
    PAGE,
    PAGE_SIZE,
    SORTING,
    ATTRIBUTES,
    DISTINCT,
    COUNT,
    SUM,
    TOTAL,
    TOTAL_ATTRIBUTES,
    AVG,
];

/// Marker flipping a sort field's direction
pub const SORT_FLIP_MARKER: char = '-';

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Raw request parameters, in request order
///
/// Deserializes straight from a query string through axum's `Query` extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(IndexMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a parameter, replacing an existing value in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as `key=value&...`; values are not percent-encoded
    pub fn to_query_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<HashMap<String, String>> for QueryParams {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<IndexMap<String, String>> for QueryParams {
    fn from(map: IndexMap<String, String>) -> Self {
        Self(map)
    }
}

/// Sort direction of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One entry of the `sorting` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field_name: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn is_ascending(&self) -> bool {
        self.direction == SortDirection::Ascending
    }

    /// Parse one token of the sort list under `convention`
    pub fn parse(token: &str, convention: SortConvention) -> Self {
        let (field_name, flipped) = match token.strip_prefix(SORT_FLIP_MARKER) {
            Some(field) => (field, true),
            None => (token, false),
        };
        let direction = match (convention, flipped) {
            (SortConvention::MinusDescending, false) | (SortConvention::MinusAscending, true) => {
                SortDirection::Ascending
            }
            _ => SortDirection::Descending,
        };
        Self {
            field_name: field_name.to_string(),
            direction,
        }
    }
}

/// Fully parsed query of one request
///
/// Created by [`QueryMapper::assemble`] and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filters: Vec<FilterClause>,
    pub sort: Vec<SortEntry>,
    /// Projection; `None` means every field
    pub attributes: Option<Vec<String>>,
    pub sum: Option<AggregateExpression>,
    pub avg: Option<AggregateExpression>,
    /// Page number (starts at 1)
    pub page: usize,
    /// Number of items per page; [`UNBOUNDED_PAGE_SIZE`] disables pagination
    pub page_size: usize,
    pub distinct: bool,
    pub count: bool,
}

impl QuerySpec {
    /// Number of rows to skip
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1).saturating_mul(self.page_size)
    }

    pub fn is_paginated(&self) -> bool {
        self.page_size < UNBOUNDED_PAGE_SIZE
    }

    pub fn is_sum(&self) -> bool {
        self.sum.is_some()
    }

    pub fn is_avg(&self) -> bool {
        self.avg.is_some()
    }
}

/// Maps request parameters to a [`QuerySpec`]
///
/// Holds the operator registry and conversion chain the request pipeline uses. Both are
/// fixed at construction and shared read-only, so one mapper can serve any number of
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct QueryMapper {
    config: MapperConfig,
    default_page_size: usize,
    clauses: ClauseParser,
    converters: Arc<ConversionChain>,
}

impl Default for QueryMapper {
    fn default() -> Self {
        Self {
            config: MapperConfig::default(),
            default_page_size: UNBOUNDED_PAGE_SIZE,
            clauses: ClauseParser::default(),
            converters: Arc::new(ConversionChain::default()),
        }
    }
}

impl QueryMapper {
    pub fn builder() -> QueryMapperBuilder {
        QueryMapperBuilder::default()
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn operators(&self) -> &OperatorRegistry {
        self.clauses.registry()
    }

    /// The chain backends use to resolve clause values
    pub fn converters(&self) -> &ConversionChain {
        &self.converters
    }

    pub fn clause_parser(&self) -> &ClauseParser {
        &self.clauses
    }

    /// Build the spec of one request
    pub fn assemble(&self, params: &QueryParams) -> Result<QuerySpec, QueryError> {
        let filters = self.map_filters(params)?;
        let spec = QuerySpec {
            filters,
            sort: self.map_sort(params),
            attributes: map_attributes(params),
            sum: map_sum(params)?,
            avg: map_aggregate(params, AVG)?,
            page: map_page(params)?,
            page_size: self.map_page_size(params)?,
            distinct: params.contains_key(DISTINCT),
            count: params.contains_key(COUNT),
        };

        tracing::debug!(
            filters = spec.filters.len(),
            sort = spec.sort.len(),
            page = spec.page,
            page_size = spec.page_size,
            "Assembled query spec"
        );

        Ok(spec)
    }

    fn map_filters(&self, params: &QueryParams) -> Result<Vec<FilterClause>, QueryError> {
        params
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| {
                self.clauses.parse(key, value).inspect_err(|e| {
                    tracing::warn!(field = key, error = %e, "Rejected filter clause");
                })
            })
            .collect()
    }

    fn map_sort(&self, params: &QueryParams) -> Vec<SortEntry> {
        params
            .get(SORTING)
            .map(split_list)
            .unwrap_or_default()
            .iter()
            .map(|token| SortEntry::parse(token, self.config.sort_convention))
            .filter(|entry| !entry.field_name.is_empty())
            .collect()
    }

    fn map_page_size(&self, params: &QueryParams) -> Result<usize, QueryError> {
        let Some(raw) = params.get(PAGE_SIZE) else {
            return Ok(self.default_page_size);
        };

        match parse_number(PAGE_SIZE, raw)? {
            NO_PAGINATION => Ok(UNBOUNDED_PAGE_SIZE),
            size if size >= 1 => Ok(usize::try_from(size)
                .unwrap_or(UNBOUNDED_PAGE_SIZE)
                .min(UNBOUNDED_PAGE_SIZE)),
            _ => Err(QueryError::InvalidPagination {
                key: PAGE_SIZE.to_string(),
                value: raw.to_string(),
                reason: "must be -1 or at least 1".to_string(),
            }),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<i64, QueryError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| QueryError::InvalidPagination {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "not an integer".to_string(),
        })
}

fn map_page(params: &QueryParams) -> Result<usize, QueryError> {
    let Some(raw) = params.get(PAGE) else {
        return Ok(1);
    };

    let page = parse_number(PAGE, raw)?;
    usize::try_from(page)
        .ok()
        .filter(|page| *page >= 1)
        .ok_or_else(|| QueryError::InvalidPagination {
            key: PAGE.to_string(),
            value: raw.to_string(),
            reason: "must be at least 1".to_string(),
        })
}

/// `None` when absent or blank, meaning every field
fn map_attributes(params: &QueryParams) -> Option<Vec<String>> {
    params
        .get(ATTRIBUTES)
        .map(split_list)
        .filter(|attributes| !attributes.is_empty())
}

fn map_aggregate(params: &QueryParams, key: &str) -> Result<Option<AggregateExpression>, QueryError> {
    params
        .get(key)
        .map(|raw| AggregateExpression::parse(key, raw))
        .transpose()
}

/// `sum`, falling back to `total` and then `totalAttributes`
fn map_sum(params: &QueryParams) -> Result<Option<AggregateExpression>, QueryError> {
    match [SUM, TOTAL, TOTAL_ATTRIBUTES]
        .into_iter()
        .find(|key| params.contains_key(key))
    {
        Some(key) => map_aggregate(params, key),
        None => Ok(None),
    }
}

/// Builder wiring a mapper to its configuration object
#[derive(Debug, Default)]
pub struct QueryMapperBuilder {
    config: Option<MapperConfig>,
    operators: Option<OperatorRegistry>,
    converters: Option<ConversionChain>,
}

impl QueryMapperBuilder {
    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = Some(operators);
        self
    }

    pub fn converters(mut self, converters: ConversionChain) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Fails when the configured default page size is invalid
    pub fn build(self) -> Result<QueryMapper, QueryError> {
        let config = self.config.unwrap_or_default();
        let default_page_size = config.resolved_default_page_size()?;
        Ok(QueryMapper {
            config,
            default_page_size,
            clauses: ClauseParser::new(Arc::new(self.operators.unwrap_or_default())),
            converters: Arc::new(self.converters.unwrap_or_default()),
        })
    }
}

/// Result of a list request: rows plus the optional aggregates and count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    /// The requested page of rows
    pub list: Vec<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<Vec<T>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<Vec<T>>,

    /// Total number of rows matching the filters, when `count` was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl<T> QueryResponse<T> {
    pub fn first(&self) -> Option<&T> {
        self.list.first()
    }

    pub fn first_sum(&self) -> Option<&T> {
        self.sum.as_ref().and_then(|rows| rows.first())
    }

    pub fn first_avg(&self) -> Option<&T> {
        self.avg.as_ref().and_then(|rows| rows.first())
    }

    pub fn sum_rows(&self) -> impl Iterator<Item = &T> {
        self.sum.iter().flatten()
    }

    pub fn avg_rows(&self) -> impl Iterator<Item = &T> {
        self.avg.iter().flatten()
    }

    /// Pagination metadata, available when the row count was requested
    pub fn pagination(&self, spec: &QuerySpec) -> Option<PaginationMeta> {
        self.count.map(|total| {
            PaginationMeta::new(spec.page, spec.page_size, usize::try_from(total).unwrap_or(usize::MAX))
        })
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,

    /// Total number of items (after filters)
    pub total: usize,

    /// Total number of pages
    pub total_pages: usize,

    /// Whether there is a next page
    pub has_next: bool,

    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create pagination metadata from calculation
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        // Ensure limit is at least 1 to avoid division by zero
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1).saturating_mul(limit);

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}
