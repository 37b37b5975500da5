//! Field types and the typed comparables raw values resolve into

use chrono::{NaiveDate, NaiveDateTime};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Date,
    DateTime,
    Enum,
    Uuid,
    #[default]
    Text,
}

impl FieldType {
    /// Textual fields compare with LIKE semantics on equality
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    /// Fields whose values can be summed or averaged
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Short
                | FieldType::Integer
                | FieldType::Long
                | FieldType::Float
                | FieldType::Double
                | FieldType::BigInteger
                | FieldType::BigDecimal
        )
    }
}

/// Type descriptor of one field, as seen by converters and backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Declared constant names, only meaningful for [`FieldType::Enum`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,

    /// Field that holds this field's average when its own type cannot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_alias: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            variants: Vec::new(),
            avg_alias: None,
        }
    }

    /// Enum field with the given constant names
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            field_type: FieldType::Enum,
            variants: variants.into_iter().map(Into::into).collect(),
            avg_alias: None,
        }
    }

    pub fn with_avg_alias(mut self, alias: impl Into<String>) -> Self {
        self.avg_alias = Some(alias.into());
        self
    }
}

/// A raw value resolved against its field's declared type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Boolean(bool),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    BigDecimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Enum(String),
    Uuid(Uuid),
    Text(String),
}

impl TypedValue {
    /// Order two values of the same kind; mixed kinds are unordered
    pub fn compare(&self, other: &TypedValue) -> Option<Ordering> {
        use TypedValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Short(a), Short(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Long(a), Long(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (BigInteger(a), BigInteger(b)) => Some(a.cmp(b)),
            (BigDecimal(a), BigDecimal(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Enum(a), Enum(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Boolean(v) => write!(f, "{}", v),
            TypedValue::Short(v) => write!(f, "{}", v),
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Long(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Double(v) => write!(f, "{}", v),
            TypedValue::BigInteger(v) => write!(f, "{}", v),
            TypedValue::BigDecimal(v) => write!(f, "{}", v),
            TypedValue::Date(v) => write!(f, "{}", v),
            TypedValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            TypedValue::Enum(v) | TypedValue::Text(v) => write!(f, "{}", v),
            TypedValue::Uuid(v) => write!(f, "{}", v),
        }
    }
}

/// A typed value together with the case-insensitivity flag of its raw value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableValue {
    pub value: TypedValue,
    pub ignore_case: bool,
}

impl ComparableValue {
    pub fn new(value: TypedValue, ignore_case: bool) -> Self {
        Self { value, ignore_case }
    }
}
