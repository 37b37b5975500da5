//! Fluent construction of request parameters
//!
//! Clients calling a service that speaks this parameter grammar can build the query
//! instead of concatenating strings:
//!
//! ```rust,ignore
//! use viewton::prelude::*;
//!
//! let params = QueryParamsBuilder::new()
//!     .filter("price").not_equals_to(1000)
//!     .filter("name").ignore_case().or("john").or("jane").next()
//!     .filter("created").desc_sort()
//!     .page(2)
//!     .page_size(20)
//!     .count()
//!     .build();
//!
//! assert_eq!(params.get("price"), Some("<>1000"));
//! assert_eq!(params.get("name"), Some("^john|jane"));
//! ```

use std::fmt::Display;

use crate::config::{NO_PAGINATION, SortConvention};
use crate::core::aggregate::LIST_SEPARATOR;
use crate::core::operator::{IGNORE_CASE_MARKER, OperatorKind, OperatorRegistry};
use crate::core::query::{
    self, AVG, COUNT, DISTINCT, PAGE, PAGE_SIZE, QueryMapper, QueryParams, SORT_FLIP_MARKER,
    SORTING, SUM, TOTAL_ATTRIBUTES,
};

/// Builder of [`QueryParams`]
///
/// Operator tokens come from the registry the builder was created for, so the output
/// re-parses with the same mapper.
#[derive(Debug, Clone, Default)]
pub struct QueryParamsBuilder {
    params: QueryParams,
    operators: OperatorRegistry,
    sort_convention: SortConvention,
}

impl QueryParamsBuilder {
    /// Builder emitting the default tokens and sort convention
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder emitting the tokens and sort convention of `mapper`
    pub fn for_mapper(mapper: &QueryMapper) -> Self {
        Self {
            params: QueryParams::new(),
            operators: mapper.operators().clone(),
            sort_convention: mapper.config().sort_convention,
        }
    }

    /// Start a condition or sort entry on `field`
    pub fn filter(self, field: impl Into<String>) -> FilterBuilder {
        FilterBuilder {
            parent: self,
            field: field.into(),
            ignore_case: false,
        }
    }

    pub fn page(mut self, page: usize) -> Self {
        self.params.insert(PAGE, page.to_string());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.params.insert(PAGE_SIZE, page_size.to_string());
        self
    }

    /// Request every matching row
    pub fn no_pagination(mut self) -> Self {
        self.params.insert(PAGE_SIZE, NO_PAGINATION.to_string());
        self
    }

    pub fn count(mut self) -> Self {
        self.params.insert(COUNT, "true");
        self
    }

    pub fn distinct(mut self) -> Self {
        self.params.insert(DISTINCT, "true");
        self
    }

    /// Restrict the projection; an empty list leaves every field selected
    pub fn attributes<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_param(query::ATTRIBUTES, attributes)
    }

    /// Sum `attributes` over the matching rows
    pub fn total_attributes<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_param(TOTAL_ATTRIBUTES, attributes)
    }

    pub fn sum<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_param(SUM, attributes)
    }

    pub fn sum_grouped<I, S, G, T>(self, attributes: I, group_by: G) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.aggregate(SUM, attributes, group_by)
    }

    pub fn avg<I, S>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_param(AVG, attributes)
    }

    pub fn avg_grouped<I, S, G, T>(self, attributes: I, group_by: G) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.aggregate(AVG, attributes, group_by)
    }

    pub fn build(self) -> QueryParams {
        self.params
    }

    fn list_param<I, S>(mut self, key: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = join_list(items);
        if !list.is_empty() {
            self.params.insert(key, list);
        }
        self
    }

    fn aggregate<I, S, G, T>(mut self, key: &str, attributes: I, group_by: G) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let attributes = join_list(attributes);
        if attributes.is_empty() {
            return self;
        }
        let group_by = join_list(group_by);
        let value = if group_by.is_empty() {
            attributes
        } else {
            format!("{}[{}]", attributes, group_by)
        };
        self.params.insert(key, value);
        self
    }

    fn token(&self, kind: OperatorKind) -> &str {
        self.operators
            .token_for(kind)
            .unwrap_or_else(|| kind.default_token())
    }

    fn push_sort(&mut self, field: &str, ascending: bool) {
        let flipped = match self.sort_convention {
            SortConvention::MinusDescending => !ascending,
            SortConvention::MinusAscending => ascending,
        };
        let entry = if flipped {
            format!("{}{}", SORT_FLIP_MARKER, field)
        } else {
            field.to_string()
        };
        let sorting = match self.params.get(SORTING) {
            Some(existing) => format!("{}{}{}", existing, LIST_SEPARATOR, entry),
            None => entry,
        };
        self.params.insert(SORTING, sorting);
    }
}

fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .collect::<Vec<String>>()
        .join(&LIST_SEPARATOR.to_string())
}

fn marked(value: impl Display, ignore_case: bool) -> String {
    if ignore_case {
        format!("{}{}", IGNORE_CASE_MARKER, value)
    } else {
        value.to_string()
    }
}

/// Condition on one field; every terminal method returns the parent builder
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    parent: QueryParamsBuilder,
    field: String,
    ignore_case: bool,
}

impl FilterBuilder {
    /// Compare the next value case-insensitively
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn equals_to(self, value: impl Display) -> QueryParamsBuilder {
        let value = marked(value, self.ignore_case);
        self.finish(value)
    }

    pub fn not_equals_to(self, value: impl Display) -> QueryParamsBuilder {
        let token = self.parent.token(OperatorKind::NotEqual);
        let value = marked(format!("{}{}", token, value), self.ignore_case);
        self.finish(value)
    }

    pub fn less(self, value: impl Display) -> QueryParamsBuilder {
        self.single(OperatorKind::Less, value)
    }

    pub fn less_or_equal(self, value: impl Display) -> QueryParamsBuilder {
        self.single(OperatorKind::LessOrEqual, value)
    }

    pub fn greater(self, value: impl Display) -> QueryParamsBuilder {
        self.single(OperatorKind::Greater, value)
    }

    pub fn greater_or_equal(self, value: impl Display) -> QueryParamsBuilder {
        self.single(OperatorKind::GreaterOrEqual, value)
    }

    /// Inclusive range
    pub fn between(self, lower: impl Display, upper: impl Display) -> QueryParamsBuilder {
        let token = self.parent.token(OperatorKind::Range);
        let value = format!(
            "{}{}{}",
            marked(lower, self.ignore_case),
            token,
            marked(upper, self.ignore_case)
        );
        self.finish(value)
    }

    /// First alternative of an OR condition
    pub fn or(self, value: impl Display) -> OrBuilder {
        let first = marked(value, self.ignore_case);
        OrBuilder {
            filter: FilterBuilder {
                ignore_case: false,
                ..self
            },
            values: vec![first],
        }
    }

    pub fn asc_sort(mut self) -> QueryParamsBuilder {
        self.parent.push_sort(&self.field, true);
        self.parent
    }

    pub fn desc_sort(mut self) -> QueryParamsBuilder {
        self.parent.push_sort(&self.field, false);
        self.parent
    }

    fn single(self, kind: OperatorKind, value: impl Display) -> QueryParamsBuilder {
        let token = self.parent.token(kind);
        let value = marked(format!("{}{}", token, value), self.ignore_case);
        self.finish(value)
    }

    fn finish(mut self, value: String) -> QueryParamsBuilder {
        self.parent.params.insert(self.field, value);
        self.parent
    }
}

/// Collects the alternatives of an OR condition until [`next`](Self::next)
#[derive(Debug, Clone)]
pub struct OrBuilder {
    filter: FilterBuilder,
    values: Vec<String>,
}

impl OrBuilder {
    /// Compare the next alternative case-insensitively
    pub fn ignore_case(mut self) -> Self {
        self.filter.ignore_case = true;
        self
    }

    pub fn or(mut self, value: impl Display) -> Self {
        self.values.push(marked(value, self.filter.ignore_case));
        self.filter.ignore_case = false;
        self
    }

    /// Close the condition and return to the parent builder
    pub fn next(self) -> QueryParamsBuilder {
        let token = self.filter.parent.token(OperatorKind::Or).to_string();
        let value = self.values.join(&token);
        self.filter.finish(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapperConfig;
    use crate::core::clause::FilterValue;
    use crate::core::operator::OperatorDescriptor;
    use crate::core::query::SortDirection;

    #[test]
    fn test_single_value_tokens() {
        let params = QueryParamsBuilder::new()
            .filter("a").less(1)
            .filter("b").less_or_equal(2)
            .filter("c").greater(3)
            .filter("d").greater_or_equal(4)
            .filter("e").equals_to("x")
            .filter("f").between("2020-01-01", "2020-12-31")
            .build();

        assert_eq!(params.get("a"), Some("<1"));
        assert_eq!(params.get("b"), Some("<=2"));
        assert_eq!(params.get("c"), Some(">3"));
        assert_eq!(params.get("d"), Some(">=4"));
        assert_eq!(params.get("e"), Some("x"));
        assert_eq!(params.get("f"), Some("2020-01-01..2020-12-31"));
    }

    #[test]
    fn test_ignore_case_marker() {
        let params = QueryParamsBuilder::new()
            .filter("name").ignore_case().equals_to("john")
            .filter("city").ignore_case().not_equals_to("paris")
            .build();
        assert_eq!(params.get("name"), Some("^john"));
        assert_eq!(params.get("city"), Some("^<>paris"));
    }

    #[test]
    fn test_ignore_case_on_comparisons_and_range() {
        let params = QueryParamsBuilder::new()
            .filter("a").ignore_case().less("m")
            .filter("b").ignore_case().less_or_equal("m")
            .filter("c").ignore_case().greater("m")
            .filter("d").ignore_case().greater_or_equal("m")
            .filter("e").ignore_case().between("a", "m")
            .build();
        assert_eq!(params.get("a"), Some("^<m"));
        assert_eq!(params.get("c"), Some("^>m"));
        assert_eq!(params.get("e"), Some("^a..^m"));

        let spec = QueryMapper::default().assemble(&params).unwrap();
        let kinds: Vec<OperatorKind> = spec.filters.iter().map(|f| f.operator).collect();
        assert_eq!(
            kinds,
            vec![
                OperatorKind::Less,
                OperatorKind::LessOrEqual,
                OperatorKind::Greater,
                OperatorKind::GreaterOrEqual,
                OperatorKind::Range,
            ]
        );
        for filter in &spec.filters {
            assert!(filter.values.iter().all(|v| v.ignore_case), "{:?}", filter);
        }
        assert_eq!(
            spec.filters[4].values,
            vec![FilterValue::new("a", true), FilterValue::new("m", true)]
        );
        assert_eq!(spec.filters[2].values, vec![FilterValue::new("m", true)]);
    }

    #[test]
    fn test_or_chain() {
        let params = QueryParamsBuilder::new()
            .filter("name")
            .ignore_case()
            .or("john")
            .or("jane")
            .ignore_case()
            .or("bob")
            .next()
            .build();
        assert_eq!(params.get("name"), Some("^john|jane|^bob"));
    }

    #[test]
    fn test_sorting_accumulates() {
        let params = QueryParamsBuilder::new()
            .filter("name").desc_sort()
            .filter("age").asc_sort()
            .build();
        assert_eq!(params.get("sorting"), Some("-name,age"));
    }

    #[test]
    fn test_sorting_follows_mapper_convention() {
        let mapper = QueryMapper::builder()
            .config(MapperConfig {
                sort_convention: SortConvention::MinusAscending,
                ..MapperConfig::default()
            })
            .build()
            .unwrap();
        let params = QueryParamsBuilder::for_mapper(&mapper)
            .filter("name").desc_sort()
            .filter("age").asc_sort()
            .build();
        assert_eq!(params.get("sorting"), Some("name,-age"));

        let spec = mapper.assemble(&params).unwrap();
        assert_eq!(spec.sort[0].direction, SortDirection::Descending);
        assert_eq!(spec.sort[1].direction, SortDirection::Ascending);
    }

    #[test]
    fn test_paging_and_flags() {
        let params = QueryParamsBuilder::new().page(3).page_size(20).count().distinct().build();
        assert_eq!(params.get("page"), Some("3"));
        assert_eq!(params.get("page_size"), Some("20"));
        assert!(params.contains_key("count"));
        assert!(params.contains_key("distinct"));

        let params = QueryParamsBuilder::new().no_pagination().build();
        assert_eq!(params.get("page_size"), Some("-1"));
    }

    #[test]
    fn test_lists_and_aggregates() {
        let params = QueryParamsBuilder::new()
            .attributes(["id", "name"])
            .total_attributes(["amount"])
            .sum_grouped(["amount", "tax"], ["region"])
            .avg(["price"])
            .build();
        assert_eq!(params.get("attributes"), Some("id,name"));
        assert_eq!(params.get("totalAttributes"), Some("amount"));
        assert_eq!(params.get("sum"), Some("amount,tax[region]"));
        assert_eq!(params.get("avg"), Some("price"));
    }

    #[test]
    fn test_empty_lists_are_skipped() {
        let params = QueryParamsBuilder::new()
            .attributes(Vec::<String>::new())
            .avg_grouped(Vec::<String>::new(), ["region"])
            .build();
        assert!(params.is_empty());
    }

    #[test]
    fn test_not_equal_round_trip() {
        let params = QueryParamsBuilder::new().filter("field").not_equals_to(123).build();
        assert_eq!(params.get("field"), Some("<>123"));

        let spec = QueryMapper::default().assemble(&params).unwrap();
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.filters[0].operator, OperatorKind::NotEqual);
        assert_eq!(spec.filters[0].values, vec![FilterValue::new("123", false)]);
    }

    #[test]
    fn test_custom_tokens() {
        let operators = OperatorRegistry::builder()
            .insert(OperatorDescriptor::new("!=", OperatorKind::NotEqual), 0)
            .build();
        let mapper = QueryMapper::builder().operators(operators).build().unwrap();
        let params = QueryParamsBuilder::for_mapper(&mapper)
            .filter("status")
            .not_equals_to("OPEN")
            .build();
        assert_eq!(params.get("status"), Some("!=OPEN"));

        let spec = mapper.assemble(&params).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::NotEqual);
        assert_eq!(spec.filters[0].values[0].raw, "OPEN");
    }
}
