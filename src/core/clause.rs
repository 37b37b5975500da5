//! Filter clauses parsed from `field=condition` request parameters
//!
//! A condition carries an operator token, one or more values and, per value, an
//! optional `^` marker requesting a case-insensitive comparison:
//!
//! ```text
//! price=<>1000               NOT_EQUAL  ["1000"]
//! name=^john|^jane           OR         ["john" (ci), "jane" (ci)]
//! date=2020-01-01..2020-12-31 RANGE     ["2020-01-01", "2020-12-31"]
//! ```
//!
//! The grammar has no escaping: a value that contains an operator token as data is
//! read as that operator.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::QueryError;
use crate::core::operator::{IGNORE_CASE_MARKER, OperatorDescriptor, OperatorKind, OperatorRegistry};

/// One raw value of a clause, before type resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterValue {
    pub raw: String,
    pub ignore_case: bool,
}

impl FilterValue {
    pub fn new(raw: impl Into<String>, ignore_case: bool) -> Self {
        Self {
            raw: raw.into(),
            ignore_case,
        }
    }

    /// Value segment of a multi-valued condition; a leading marker sets `ignore_case`
    fn from_segment(segment: &str) -> Self {
        match segment.strip_prefix(IGNORE_CASE_MARKER) {
            Some(rest) => Self::new(rest, true),
            None => Self::new(segment, false),
        }
    }
}

/// One field's parsed condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field_name: String,
    pub operator: OperatorKind,
    pub values: Vec<FilterValue>,
}

impl FilterClause {
    /// The single value of a one-valued operator
    pub fn first_value(&self) -> Option<&FilterValue> {
        self.values.first()
    }
}

/// Parses raw conditions using an operator registry
#[derive(Debug, Clone, Default)]
pub struct ClauseParser {
    registry: Arc<OperatorRegistry>,
}

impl ClauseParser {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Parse `raw_condition` for `field_name`
    pub fn parse(&self, field_name: &str, raw_condition: &str) -> Result<FilterClause, QueryError> {
        let operator = self.registry.find_applicable(field_name, raw_condition)?;
        tracing::trace!(field = field_name, condition = raw_condition, operator = %operator.kind, "Resolved operator");

        let values = if operator.kind.is_multi_valued() {
            let values = split_values(field_name, raw_condition, operator)?;
            match operator.kind {
                OperatorKind::Range if values.len() != 2 => {
                    return Err(QueryError::InvalidRange {
                        field: field_name.to_string(),
                        condition: raw_condition.to_string(),
                        segments: values.len(),
                    });
                }
                OperatorKind::Or if values.is_empty() => {
                    return Err(QueryError::InvalidOrSyntax {
                        field: field_name.to_string(),
                        condition: raw_condition.to_string(),
                    });
                }
                _ => values,
            }
        } else {
            vec![single_value(raw_condition, operator)]
        };

        Ok(FilterClause {
            field_name: field_name.to_string(),
            operator: operator.kind,
            values,
        })
    }
}

/// Split on the operator token; trailing empty segments are dropped
fn split_values(
    field_name: &str,
    condition: &str,
    operator: &OperatorDescriptor,
) -> Result<Vec<FilterValue>, QueryError> {
    if operator.token.is_empty() {
        return Err(QueryError::Config {
            message: format!(
                "{} operator for '{}' has an empty token and cannot split values",
                operator.kind, field_name
            ),
        });
    }

    let mut segments: Vec<&str> = condition.split(operator.token.as_str()).collect();
    while segments.last().is_some_and(|segment| segment.is_empty()) {
        segments.pop();
    }

    Ok(segments.into_iter().map(FilterValue::from_segment).collect())
}

/// Strip every marker, then the first occurrence of the operator token
fn single_value(condition: &str, operator: &OperatorDescriptor) -> FilterValue {
    let ignore_case = condition.contains(IGNORE_CASE_MARKER);
    let unmarked = if ignore_case {
        condition.replace(IGNORE_CASE_MARKER, "")
    } else {
        condition.to_string()
    };

    let raw = if operator.token.is_empty() {
        unmarked
    } else {
        unmarked.replacen(operator.token.as_str(), "", 1)
    };

    FilterValue::new(raw, ignore_case)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(condition: &str) -> Result<FilterClause, QueryError> {
        ClauseParser::default().parse("f", condition)
    }

    fn value(raw: &str, ignore_case: bool) -> FilterValue {
        FilterValue::new(raw, ignore_case)
    }

    #[test]
    fn test_single_value_operators() {
        let cases = [
            ("<=10", OperatorKind::LessOrEqual),
            (">=10", OperatorKind::GreaterOrEqual),
            ("<>10", OperatorKind::NotEqual),
            ("<10", OperatorKind::Less),
            (">10", OperatorKind::Greater),
            ("10", OperatorKind::Equal),
        ];
        for (condition, kind) in cases {
            let clause = parse(condition).unwrap();
            assert_eq!(clause.operator, kind, "condition {}", condition);
            assert_eq!(clause.values, vec![value("10", false)], "condition {}", condition);
        }
    }

    #[test]
    fn test_ignore_case_equal() {
        let clause = parse("^abc").unwrap();
        assert_eq!(clause.operator, OperatorKind::Equal);
        assert_eq!(clause.values, vec![value("abc", true)]);
    }

    #[test]
    fn test_ignore_case_before_token() {
        let clause = parse("^<>abc").unwrap();
        assert_eq!(clause.operator, OperatorKind::NotEqual);
        assert_eq!(clause.values, vec![value("abc", true)]);
    }

    #[test]
    fn test_only_first_token_removed() {
        let clause = parse("<>a<>b").unwrap();
        assert_eq!(clause.values, vec![value("a<>b", false)]);
    }

    #[test]
    fn test_empty_residue_is_valid() {
        let clause = parse("<>").unwrap();
        assert_eq!(clause.operator, OperatorKind::NotEqual);
        assert_eq!(clause.values, vec![value("", false)]);

        let clause = parse("").unwrap();
        assert_eq!(clause.operator, OperatorKind::Equal);
        assert_eq!(clause.values, vec![value("", false)]);
    }

    #[test]
    fn test_or_per_value_marker() {
        let clause = parse("a|^b").unwrap();
        assert_eq!(clause.operator, OperatorKind::Or);
        assert_eq!(clause.values, vec![value("a", false), value("b", true)]);
    }

    #[test]
    fn test_or_keeps_input_order() {
        let clause = parse("^john|^jane|bob").unwrap();
        assert_eq!(
            clause.values,
            vec![value("john", true), value("jane", true), value("bob", false)]
        );
    }

    #[test]
    fn test_or_trailing_separator_dropped() {
        let clause = parse("a|").unwrap();
        assert_eq!(clause.values, vec![value("a", false)]);
    }

    #[test]
    fn test_or_without_values_fails() {
        let err = parse("||").unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidOrSyntax {
                field: "f".to_string(),
                condition: "||".to_string(),
            }
        );
    }

    #[test]
    fn test_range() {
        let clause = parse("1..5").unwrap();
        assert_eq!(clause.operator, OperatorKind::Range);
        assert_eq!(clause.values, vec![value("1", false), value("5", false)]);
    }

    #[test]
    fn test_range_dates_with_marker() {
        let clause = parse("^a..^z").unwrap();
        assert_eq!(clause.values, vec![value("a", true), value("z", true)]);
    }

    #[test]
    fn test_range_with_three_bounds_fails() {
        let err = parse("1..5..9").unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidRange {
                field: "f".to_string(),
                condition: "1..5..9".to_string(),
                segments: 3,
            }
        );
    }

    #[test]
    fn test_open_range_fails() {
        let err = parse("1..").unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { segments: 1, .. }));
    }

    #[test]
    fn test_range_takes_priority_over_or_only_by_order() {
        // `..` comes before `|` in the default registry
        let clause = parse("1..5|7").unwrap();
        assert_eq!(clause.operator, OperatorKind::Range);
        assert_eq!(clause.values, vec![value("1", false), value("5|7", false)]);
    }

    #[test]
    fn test_custom_registry() {
        let registry = OperatorRegistry::builder()
            .insert(OperatorDescriptor::new(",", OperatorKind::Or), 0)
            .build();
        let parser = ClauseParser::new(Arc::new(registry));
        let clause = parser.parse("tag", "red,green").unwrap();
        assert_eq!(clause.operator, OperatorKind::Or);
        assert_eq!(clause.values, vec![value("red", false), value("green", false)]);
    }

    #[test]
    fn test_empty_split_token_is_config_error() {
        let registry = OperatorRegistry::builder()
            .clear()
            .push(OperatorDescriptor::new("", OperatorKind::Or))
            .build();
        let parser = ClauseParser::new(Arc::new(registry));
        let err = parser.parse("tag", "red").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_unrecognized_operator() {
        let parser = ClauseParser::new(Arc::new(OperatorRegistry::empty()));
        let err = parser.parse("tag", "red").unwrap_err();
        assert_eq!(err.error_code(), "UNRECOGNIZED_OPERATOR");
    }
}
