//! In-memory query backend over JSON rows, for testing and development
//!
//! Rows are `serde_json` objects. Each row value is read through the same
//! [`ConversionChain`] as the request values, so a `"2020-01-01"` string in a row and in
//! a filter resolve to the same typed date. Comparisons follow SQL semantics: a missing
//! or `null` row value makes every comparison unknown, and unknown rows are filtered out.

use async_trait::async_trait;
use indexmap::IndexMap;
use num_bigint::BigInt;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::core::aggregate::{AggregateExpression, AggregateFunction};
use crate::core::clause::{FilterClause, FilterValue};
use crate::core::convert::ConversionChain;
use crate::core::entity::EntityMetadata;
use crate::core::error::QueryError;
use crate::core::field::{FieldDescriptor, FieldType, TypedValue};
use crate::core::operator::OperatorKind;
use crate::core::predicate::{PredicateBackend, is_null_literal};
use crate::core::query::{QuerySpec, SortDirection};
use crate::core::service::QueryService;

/// One stored row
pub type Row = Map<String, Value>;

/// Predicate over in-memory rows
#[derive(Debug, Clone)]
pub enum RowPredicate {
    IsNull(FieldDescriptor),
    /// LIKE pattern compiled to an anchored regex
    Like {
        field: FieldDescriptor,
        pattern: Regex,
    },
    Compare {
        field: FieldDescriptor,
        operator: OperatorKind,
        value: TypedValue,
        ignore_case: bool,
    },
    Between {
        field: FieldDescriptor,
        lower: TypedValue,
        upper: TypedValue,
        ignore_case: bool,
    },
    Not(Box<RowPredicate>),
    Any(Vec<RowPredicate>),
}

impl RowPredicate {
    /// Evaluate against a row; `None` is SQL's unknown
    pub fn evaluate(&self, row: &Row, resolver: &ConversionChain) -> Option<bool> {
        match self {
            RowPredicate::IsNull(field) => Some(is_null(row, field)),
            RowPredicate::Like { field, pattern } => {
                let value = read_field(row, field, resolver)?;
                Some(pattern.is_match(&value.to_string()))
            }
            RowPredicate::Compare {
                field,
                operator,
                value,
                ignore_case,
            } => {
                let actual = fold(read_field(row, field, resolver)?, *ignore_case);
                let ordering = actual.compare(&fold(value.clone(), *ignore_case))?;
                Some(match operator {
                    OperatorKind::Less => ordering == Ordering::Less,
                    OperatorKind::LessOrEqual => ordering != Ordering::Greater,
                    OperatorKind::Greater => ordering == Ordering::Greater,
                    OperatorKind::GreaterOrEqual => ordering != Ordering::Less,
                    _ => ordering == Ordering::Equal,
                })
            }
            RowPredicate::Between {
                field,
                lower,
                upper,
                ignore_case,
            } => {
                let actual = fold(read_field(row, field, resolver)?, *ignore_case);
                let above = actual.compare(&fold(lower.clone(), *ignore_case))?;
                let below = actual.compare(&fold(upper.clone(), *ignore_case))?;
                Some(above != Ordering::Less && below != Ordering::Greater)
            }
            RowPredicate::Not(inner) => inner.evaluate(row, resolver).map(|matched| !matched),
            RowPredicate::Any(alternatives) => {
                let mut unknown = false;
                for alternative in alternatives {
                    match alternative.evaluate(row, resolver) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
        }
    }

    pub fn matches(&self, row: &Row, resolver: &ConversionChain) -> bool {
        self.evaluate(row, resolver) == Some(true)
    }
}

/// Predicate backend rendering clauses into [`RowPredicate`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryBackend;

impl InMemoryBackend {
    fn equal(
        &self,
        value: &FilterValue,
        field: &FieldDescriptor,
        resolver: &ConversionChain,
    ) -> Result<RowPredicate, QueryError> {
        if is_null_literal(value) {
            return Ok(RowPredicate::IsNull(field.clone()));
        }
        if field.field_type.is_textual() {
            return Ok(RowPredicate::Like {
                field: field.clone(),
                pattern: like_regex(&value.raw, value.ignore_case)?,
            });
        }
        self.compare(OperatorKind::Equal, value, field, resolver)
    }

    fn compare(
        &self,
        operator: OperatorKind,
        value: &FilterValue,
        field: &FieldDescriptor,
        resolver: &ConversionChain,
    ) -> Result<RowPredicate, QueryError> {
        let resolved = resolver.resolve(value, field)?;
        Ok(RowPredicate::Compare {
            field: field.clone(),
            operator,
            value: resolved.value,
            ignore_case: resolved.ignore_case,
        })
    }
}

impl PredicateBackend for InMemoryBackend {
    type Predicate = RowPredicate;

    fn to_predicate(
        &self,
        clause: &FilterClause,
        field: &FieldDescriptor,
        resolver: &ConversionChain,
    ) -> Result<RowPredicate, QueryError> {
        let first = || {
            clause.first_value().ok_or_else(|| QueryError::Config {
                message: format!("{} clause on '{}' has no value", clause.operator, clause.field_name),
            })
        };

        match clause.operator {
            OperatorKind::Equal => self.equal(first()?, field, resolver),
            OperatorKind::NotEqual => Ok(RowPredicate::Not(Box::new(
                self.equal(first()?, field, resolver)?,
            ))),
            OperatorKind::Less
            | OperatorKind::LessOrEqual
            | OperatorKind::Greater
            | OperatorKind::GreaterOrEqual => self.compare(clause.operator, first()?, field, resolver),
            OperatorKind::Range => match clause.values.as_slice() {
                [lower, upper] => {
                    let lower = resolver.resolve(lower, field)?;
                    let upper = resolver.resolve(upper, field)?;
                    Ok(RowPredicate::Between {
                        field: field.clone(),
                        ignore_case: lower.ignore_case || upper.ignore_case,
                        lower: lower.value,
                        upper: upper.value,
                    })
                }
                values => Err(QueryError::InvalidRange {
                    field: clause.field_name.clone(),
                    condition: values
                        .iter()
                        .map(|v| v.raw.as_str())
                        .collect::<Vec<_>>()
                        .join(".."),
                    segments: values.len(),
                }),
            },
            OperatorKind::Or => clause
                .values
                .iter()
                .map(|value| self.equal(value, field, resolver))
                .collect::<Result<Vec<_>, _>>()
                .map(RowPredicate::Any),
        }
    }
}

/// Compile a SQL LIKE pattern (`%` any run, `_` one character) to an anchored regex
pub fn like_regex(pattern: &str, ignore_case: bool) -> Result<Regex, QueryError> {
    let mut source = String::from(if ignore_case { "(?is)^" } else { "(?s)^" });
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| QueryError::Config {
        message: format!("Invalid LIKE pattern '{}': {}", pattern, e),
    })
}

fn is_null(row: &Row, field: &FieldDescriptor) -> bool {
    row.get(&field.name).is_none_or(Value::is_null)
}

/// Typed value of a row field; missing, null or unreadable values are unknown
fn read_field(row: &Row, field: &FieldDescriptor, resolver: &ConversionChain) -> Option<TypedValue> {
    let raw = match row.get(&field.name)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    resolver
        .resolve(&FilterValue::new(raw, false), field)
        .ok()
        .map(|resolved| resolved.value)
}

fn fold(value: TypedValue, ignore_case: bool) -> TypedValue {
    match value {
        TypedValue::Text(s) if ignore_case => TypedValue::Text(s.to_lowercase()),
        TypedValue::Enum(s) if ignore_case => TypedValue::Enum(s.to_lowercase()),
        other => other,
    }
}

/// In-memory query service
///
/// Uses RwLock for thread-safe access. Cloning shares the same rows.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    metadata: Arc<EntityMetadata>,
    rows: Arc<RwLock<Vec<Row>>>,
    resolver: Arc<ConversionChain>,
    backend: InMemoryBackend,
}

impl InMemoryStore {
    /// Create an empty store for the entity described by `metadata`
    pub fn new(metadata: EntityMetadata) -> Self {
        Self {
            metadata: Arc::new(metadata),
            rows: Arc::new(RwLock::new(Vec::new())),
            resolver: Arc::new(ConversionChain::default()),
            backend: InMemoryBackend,
        }
    }

    /// Use a custom conversion chain, typically the mapper's
    pub fn with_converters(mut self, resolver: ConversionChain) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Append a row; it must be a JSON object
    pub fn insert(&self, row: Value) -> Result<(), QueryError> {
        let row = match row {
            Value::Object(row) => row,
            other => {
                return Err(QueryError::Storage {
                    message: format!("Rows must be JSON objects, got {}", other),
                });
            }
        };

        let mut rows = self.rows.write().map_err(|e| QueryError::Storage {
            message: format!("Failed to acquire write lock: {}", e),
        })?;
        rows.push(row);
        Ok(())
    }

    pub fn insert_many(&self, rows: impl IntoIterator<Item = Value>) -> Result<(), QueryError> {
        rows.into_iter().try_for_each(|row| self.insert(row))
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows matching every filter of `spec`, in insertion order
    fn filtered(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        let predicates =
            self.backend
                .to_predicates(&spec.filters, &self.metadata, &self.resolver)?;

        let rows = self.rows.read().map_err(|e| QueryError::Storage {
            message: format!("Failed to acquire read lock: {}", e),
        })?;

        Ok(rows
            .iter()
            .filter(|row| {
                predicates
                    .iter()
                    .all(|predicate| predicate.matches(row, &self.resolver))
            })
            .cloned()
            .collect())
    }

    /// Filtered, sorted, projected and de-duplicated rows, before pagination
    fn selected(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        let mut rows = self.filtered(spec)?;
        self.sort(&mut rows, spec)?;

        let mut rows = match &spec.attributes {
            Some(attributes) => {
                for attribute in attributes {
                    self.metadata.require(attribute)?;
                }
                rows.iter().map(|row| project(row, attributes)).collect::<Vec<_>>()
            }
            None => rows,
        };

        if spec.distinct {
            let mut seen = Vec::with_capacity(rows.len());
            rows.retain(|row| {
                if seen.contains(row) {
                    false
                } else {
                    seen.push(row.clone());
                    true
                }
            });
        }

        Ok(rows)
    }

    /// Stable sort; missing values order before present ones
    fn sort(&self, rows: &mut Vec<Row>, spec: &QuerySpec) -> Result<(), QueryError> {
        let keys = spec
            .sort
            .iter()
            .map(|entry| {
                self.metadata
                    .require(&entry.field_name)
                    .map(|field| (field, entry.direction))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if keys.is_empty() {
            return Ok(());
        }

        // Resolve every sort key once per row
        let mut decorated: Vec<(Vec<Option<TypedValue>>, Row)> = rows
            .drain(..)
            .map(|row| {
                let values = keys
                    .iter()
                    .map(|(field, _)| read_field(&row, field, &self.resolver))
                    .collect();
                (values, row)
            })
            .collect();

        decorated.sort_by(|(a, _), (b, _)| {
            keys.iter()
                .zip(a.iter().zip(b))
                .map(|((_, direction), (left, right))| {
                    let ordering = match (left, right) {
                        (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
                        (None, Some(_)) => Ordering::Less,
                        (Some(_), None) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    match direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        rows.extend(decorated.into_iter().map(|(_, row)| row));
        Ok(())
    }

    fn aggregate(
        &self,
        spec: &QuerySpec,
        expression: &AggregateExpression,
        function: AggregateFunction,
    ) -> Result<Vec<Value>, QueryError> {
        let group_by = expression.group_by.clone().unwrap_or_default();
        let group_fields = group_by
            .iter()
            .map(|name| self.metadata.require(name))
            .collect::<Result<Vec<_>, _>>()?;
        let attribute_fields = expression
            .attributes
            .iter()
            .map(|name| self.metadata.require(name))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(field) = attribute_fields.iter().find(|f| !f.field_type.is_numeric()) {
            return Err(QueryError::NonNumericAggregate {
                field: field.name.clone(),
                function: function.to_string(),
            });
        }
        let output_names = expression.all_fields(function, &self.metadata);
        let value_names = &output_names[group_fields.len()..];

        // Keyed by the serialized group values, in first-seen order
        let mut groups: IndexMap<String, (Vec<Value>, Vec<Row>)> = IndexMap::new();
        for row in self.filtered(spec)? {
            let key: Vec<Value> = group_fields
                .iter()
                .map(|field| row.get(&field.name).cloned().unwrap_or(Value::Null))
                .collect();
            groups
                .entry(Value::from(key.clone()).to_string())
                .or_insert_with(|| (key, Vec::new()))
                .1
                .push(row);
        }
        if groups.is_empty() && group_fields.is_empty() {
            groups.insert(String::new(), (Vec::new(), Vec::new()));
        }

        tracing::trace!(%function, groups = groups.len(), "Computed aggregate groups");

        groups
            .into_values()
            .map(|(key, rows)| {
                let mut output = Row::new();
                for (name, value) in group_by.iter().zip(key) {
                    output.insert(name.clone(), value);
                }
                for (name, field) in value_names.iter().zip(&attribute_fields) {
                    let values: Vec<TypedValue> = rows
                        .iter()
                        .filter_map(|row| read_field(row, field, &self.resolver))
                        .collect();
                    output.insert(name.clone(), reduce(function, field, &values)?);
                }
                Ok::<_, QueryError>(Value::Object(output))
            })
            .collect()
    }
}

fn project(row: &Row, attributes: &[String]) -> Row {
    attributes
        .iter()
        .map(|name| (name.clone(), row.get(name).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// SUM or AVG of the present values; `null` when there are none
///
/// Integral fields sum exactly in `i64`, big integers in [`BigInt`] and big decimals in
/// [`Decimal`]; only floating point fields go through `f64`. Big integer and big decimal
/// results are rendered as strings so no digit is lost in JSON.
fn reduce(
    function: AggregateFunction,
    field: &FieldDescriptor,
    values: &[TypedValue],
) -> Result<Value, QueryError> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let count = values.len();
    let overflow = || QueryError::Storage {
        message: format!("{} of '{}' overflows", function, field.name),
    };

    match field.field_type {
        FieldType::Short | FieldType::Integer | FieldType::Long => {
            let total = values
                .iter()
                .filter_map(|value| match value {
                    TypedValue::Short(v) => Some(i64::from(*v)),
                    TypedValue::Integer(v) => Some(i64::from(*v)),
                    TypedValue::Long(v) => Some(*v),
                    _ => None,
                })
                .try_fold(0i64, |acc, v| acc.checked_add(v))
                .ok_or_else(overflow)?;
            Ok(match function {
                AggregateFunction::Sum => Value::from(total),
                AggregateFunction::Avg => number(total as f64 / count as f64),
            })
        }
        FieldType::BigInteger => {
            let total = values
                .iter()
                .filter_map(|value| match value {
                    TypedValue::BigInteger(v) => Some(v),
                    _ => None,
                })
                .fold(BigInt::default(), |acc, v| acc + v);
            match function {
                AggregateFunction::Sum => Ok(Value::String(total.to_string())),
                AggregateFunction::Avg => {
                    let average = Decimal::from_str(&total.to_string())
                        .ok()
                        .and_then(|total| total.checked_div(Decimal::from(count as u64)))
                        .ok_or_else(overflow)?;
                    Ok(Value::String(average.to_string()))
                }
            }
        }
        FieldType::BigDecimal => {
            let total = values
                .iter()
                .filter_map(|value| match value {
                    TypedValue::BigDecimal(v) => Some(*v),
                    _ => None,
                })
                .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
                .ok_or_else(overflow)?;
            let result = match function {
                AggregateFunction::Sum => total,
                AggregateFunction::Avg => total
                    .checked_div(Decimal::from(count as u64))
                    .ok_or_else(overflow)?,
            };
            Ok(Value::String(result.to_string()))
        }
        _ => {
            let total: f64 = values
                .iter()
                .filter_map(|value| match value {
                    TypedValue::Float(v) => Some(f64::from(*v)),
                    TypedValue::Double(v) => Some(*v),
                    _ => None,
                })
                .sum();
            Ok(match function {
                AggregateFunction::Sum => number(total),
                AggregateFunction::Avg => number(total / count as f64),
            })
        }
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[async_trait]
impl QueryService<Value> for InMemoryStore {
    async fn list(&self, spec: &QuerySpec) -> Result<Vec<Value>, QueryError> {
        Ok(self
            .selected(spec)?
            .into_iter()
            .skip(spec.offset())
            .take(spec.page_size)
            .map(Value::Object)
            .collect())
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, QueryError> {
        let rows = if spec.distinct {
            self.selected(spec)?
        } else {
            self.filtered(spec)?
        };
        Ok(rows.len() as u64)
    }

    async fn sum(&self, spec: &QuerySpec) -> Result<Vec<Value>, QueryError> {
        match &spec.sum {
            Some(expression) => self.aggregate(spec, expression, AggregateFunction::Sum),
            None => Ok(Vec::new()),
        }
    }

    async fn avg(&self, spec: &QuerySpec) -> Result<Vec<Value>, QueryError> {
        match &spec.avg {
            Some(expression) => self.aggregate(spec, expression, AggregateFunction::Avg),
            None => Ok(Vec::new()),
        }
    }
}
