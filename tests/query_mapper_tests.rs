//! Integration tests for turning request parameters into query specs
//!
//! These tests verify that:
//! - Operator tokens and case markers are recognised
//! - Pagination, sorting and aggregates are mapped
//! - Assembly is all-or-nothing and deterministic
//! - Parameters built fluently re-parse to the same clauses

use viewton::prelude::*;

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs.iter().copied().collect()
}

fn assemble(pairs: &[(&str, &str)]) -> Result<QuerySpec, QueryError> {
    QueryMapper::default().assemble(&params(pairs))
}

fn value(raw: &str, ignore_case: bool) -> FilterValue {
    FilterValue::new(raw, ignore_case)
}

// =============================================================================
// Filter Clause Tests
// =============================================================================

mod clause_tests {
    use super::*;

    #[test]
    fn test_every_single_value_token() {
        let tokens = [
            ("<=", OperatorKind::LessOrEqual),
            (">=", OperatorKind::GreaterOrEqual),
            ("<>", OperatorKind::NotEqual),
            ("<", OperatorKind::Less),
            (">", OperatorKind::Greater),
            ("", OperatorKind::Equal),
        ];
        for (token, kind) in tokens {
            for v in ["42", "abc", "2020-01-01", ""] {
                let condition = format!("{}{}", token, v);
                let spec = assemble(&[("f", condition.as_str())]).unwrap();
                assert_eq!(spec.filters[0].operator, kind, "condition {}", condition);
                assert_eq!(spec.filters[0].values, vec![value(v, false)], "condition {}", condition);
            }
        }
    }

    #[test]
    fn test_case_insensitive_equal() {
        let spec = assemble(&[("f", "^abc")]).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::Equal);
        assert_eq!(spec.filters[0].values, vec![value("abc", true)]);
    }

    #[test]
    fn test_or_with_per_value_marker() {
        let spec = assemble(&[("f", "a|^b")]).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::Or);
        assert_eq!(spec.filters[0].values, vec![value("a", false), value("b", true)]);
    }

    #[test]
    fn test_range() {
        let spec = assemble(&[("f", "1..5")]).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::Range);
        assert_eq!(spec.filters[0].values, vec![value("1", false), value("5", false)]);

        let err = assemble(&[("f", "1..5..9")]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { segments: 3, .. }));
    }

    #[test]
    fn test_value_containing_token_is_misread() {
        // No escaping: a free-text value holding `..` is read as a range
        let spec = assemble(&[("title", "wait..what")]).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::Range);
    }

    #[test]
    fn test_custom_registry_through_mapper() {
        let operators = OperatorRegistry::builder()
            .insert(OperatorDescriptor::new("~", OperatorKind::Or), 0)
            .build();
        let mapper = QueryMapper::builder().operators(operators).build().unwrap();
        let spec = mapper.assemble(&params(&[("tag", "red~^blue")])).unwrap();
        assert_eq!(spec.filters[0].operator, OperatorKind::Or);
        assert_eq!(spec.filters[0].values, vec![value("red", false), value("blue", true)]);
    }
}

// =============================================================================
// Assembly Tests
// =============================================================================

mod assembly_tests {
    use super::*;

    #[test]
    fn test_full_request() {
        let spec = assemble(&[
            ("status", "OPEN|^pending"),
            ("price", "<>1000"),
            ("sorting", "-created,id"),
            ("attributes", "id,price"),
            ("sum", "amount[region,year]"),
            ("avg", "price"),
            ("page", "3"),
            ("page_size", "20"),
            ("distinct", ""),
            ("count", "no"),
        ])
        .unwrap();

        assert_eq!(spec.filters.len(), 2);
        assert_eq!(spec.sort.len(), 2);
        assert_eq!(spec.sort[0].field_name, "created");
        assert_eq!(spec.sort[0].direction, SortDirection::Descending);
        assert!(spec.sort[1].is_ascending());
        assert_eq!(spec.attributes, Some(vec!["id".to_string(), "price".to_string()]));
        assert_eq!(
            spec.sum,
            Some(AggregateExpression {
                attributes: vec!["amount".to_string()],
                group_by: Some(vec!["region".to_string(), "year".to_string()]),
            })
        );
        assert_eq!(spec.avg.as_ref().unwrap().group_by, None);
        assert_eq!(spec.offset(), 40);
        assert!(spec.distinct);
        assert!(spec.count);
    }

    #[test]
    fn test_pagination_defaults() {
        let spec = assemble(&[]).unwrap();
        assert_eq!(spec.page, 1);
        assert_eq!(spec.offset(), 0);
        assert!(!spec.is_paginated());

        let spec = assemble(&[("page_size", "-1")]).unwrap();
        assert!(!spec.is_paginated());
    }

    #[test]
    fn test_one_bad_clause_fails_everything() {
        let err = assemble(&[("a", "1"), ("b", "x..y..z"), ("page", "2")]).unwrap_err();
        assert_eq!(err.field(), Some("b"));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let p = params(&[
            ("name", "^john|jane"),
            ("age", "18..65"),
            ("sorting", "-age"),
            ("sum", "salary[dept]"),
        ]);
        let mapper = QueryMapper::default();
        assert_eq!(mapper.assemble(&p).unwrap(), mapper.assemble(&p).unwrap());
    }

    #[test]
    fn test_spec_serializes() {
        let spec = assemble(&[("price", "<>1000")]).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["filters"][0]["operator"], "NOT_EQUAL");
        assert_eq!(json["filters"][0]["values"][0]["raw"], "1000");
    }
}

// =============================================================================
// Builder Round-Trip Tests
// =============================================================================

mod builder_tests {
    use super::*;

    #[test]
    fn test_not_equal_round_trip() {
        let params = QueryParamsBuilder::new().filter("field").not_equals_to(123).build();
        let spec = QueryMapper::default().assemble(&params).unwrap();
        assert_eq!(spec.filters[0].field_name, "field");
        assert_eq!(spec.filters[0].operator, OperatorKind::NotEqual);
        assert_eq!(spec.filters[0].values, vec![value("123", false)]);
    }

    #[test]
    fn test_full_builder_round_trip() {
        let params = QueryParamsBuilder::new()
            .filter("name").ignore_case().or("john").or("jane").next()
            .filter("age").between(18, 65)
            .filter("score").greater_or_equal(10)
            .filter("created").desc_sort()
            .filter("id").asc_sort()
            .attributes(["id", "name"])
            .sum_grouped(["score"], ["team"])
            .page(2)
            .page_size(10)
            .count()
            .build();

        let spec = QueryMapper::default().assemble(&params).unwrap();
        assert_eq!(spec.filters.len(), 3);
        assert_eq!(spec.filters[0].values, vec![value("john", true), value("jane", false)]);
        assert_eq!(spec.filters[1].values, vec![value("18", false), value("65", false)]);
        assert_eq!(spec.filters[2].operator, OperatorKind::GreaterOrEqual);
        assert_eq!(spec.sort[0].direction, SortDirection::Descending);
        assert_eq!(spec.sort[1].direction, SortDirection::Ascending);
        assert_eq!(spec.sum.as_ref().unwrap().group_by, Some(vec!["team".to_string()]));
        assert_eq!(spec.offset(), 10);
        assert!(spec.count);
    }

    #[test]
    fn test_no_pagination_round_trip() {
        let params = QueryParamsBuilder::new().page(5).no_pagination().build();
        let spec = QueryMapper::default().assemble(&params).unwrap();
        assert!(!spec.is_paginated());
    }
}
