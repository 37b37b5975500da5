//! Type conversion chain: raw strings to typed comparables
//!
//! Each [`TypeConverter`] declares which field types it accepts. The chain tries them in
//! order and the first one that accepts the target field converts the value; when none
//! does, the raw string is used as a [`TypedValue::Text`]. The literal `null` gets no
//! special treatment here, backends decide what it means.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::clause::FilterValue;
use crate::core::error::QueryError;
use crate::core::field::{ComparableValue, FieldDescriptor, FieldType, TypedValue};

/// Turns a raw filter value into a typed comparable for a given field
pub trait TypeConverter: Send + Sync {
    /// Whether this converter handles the field's declared type
    fn accepts(&self, field: &FieldDescriptor) -> bool;

    /// Convert the raw value; called only when [`accepts`](Self::accepts) returned true
    fn convert(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError>;
}

/// Converters for types whose literal grammar is their `FromStr` implementation
macro_rules! parse_converter {
    ($(#[$meta:meta])* $name:ident, $field_type:ident, $ty:ty, $expected:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl TypeConverter for $name {
            fn accepts(&self, field: &FieldDescriptor) -> bool {
                field.field_type == FieldType::$field_type
            }

            fn convert(
                &self,
                raw: &FilterValue,
                field: &FieldDescriptor,
            ) -> Result<ComparableValue, QueryError> {
                <$ty>::from_str(&raw.raw)
                    .map(|value| ComparableValue::new(TypedValue::$field_type(value), raw.ignore_case))
                    .map_err(|_| QueryError::value_format(&field.name, &raw.raw, $expected))
            }
        }
    };
}

parse_converter!(
    /// 16-bit integers
    ShortConverter, Short, i16, "short integer"
);
parse_converter!(
    /// 32-bit integers
    IntegerConverter, Integer, i32, "integer"
);
parse_converter!(
    /// 64-bit integers
    LongConverter, Long, i64, "long integer"
);
parse_converter!(FloatConverter, Float, f32, "float");
parse_converter!(DoubleConverter, Double, f64, "double");
parse_converter!(BigIntegerConverter, BigInteger, BigInt, "big integer");
parse_converter!(UuidConverter, Uuid, Uuid, "UUID");

/// Booleans: `true` in any case is true, anything else is false
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl TypeConverter for BooleanConverter {
    fn accepts(&self, field: &FieldDescriptor) -> bool {
        field.field_type == FieldType::Boolean
    }

    fn convert(
        &self,
        raw: &FilterValue,
        _field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        let value = raw.raw.eq_ignore_ascii_case("true");
        Ok(ComparableValue::new(TypedValue::Boolean(value), raw.ignore_case))
    }
}

/// Arbitrary-precision decimals, plain or scientific notation
#[derive(Debug, Clone, Copy, Default)]
pub struct BigDecimalConverter;

impl TypeConverter for BigDecimalConverter {
    fn accepts(&self, field: &FieldDescriptor) -> bool {
        field.field_type == FieldType::BigDecimal
    }

    fn convert(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        Decimal::from_str(&raw.raw)
            .or_else(|_| Decimal::from_scientific(&raw.raw))
            .map(|value| ComparableValue::new(TypedValue::BigDecimal(value), raw.ignore_case))
            .map_err(|_| QueryError::value_format(&field.name, &raw.raw, "decimal"))
    }
}

/// ISO-8601 calendar dates (`2020-01-31`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter;

impl TypeConverter for DateConverter {
    fn accepts(&self, field: &FieldDescriptor) -> bool {
        field.field_type == FieldType::Date
    }

    fn convert(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        NaiveDate::parse_from_str(&raw.raw, "%Y-%m-%d")
            .map(|value| ComparableValue::new(TypedValue::Date(value), raw.ignore_case))
            .map_err(|_| QueryError::value_format(&field.name, &raw.raw, "ISO-8601 date"))
    }
}

/// ISO-8601 local date-times; an offset, when present, is dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl DateTimeConverter {
    fn parse(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|value| value.naive_local())
            })
    }
}

impl TypeConverter for DateTimeConverter {
    fn accepts(&self, field: &FieldDescriptor) -> bool {
        field.field_type == FieldType::DateTime
    }

    fn convert(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        Self::parse(&raw.raw)
            .map(|value| ComparableValue::new(TypedValue::DateTime(value), raw.ignore_case))
            .ok_or_else(|| QueryError::value_format(&field.name, &raw.raw, "ISO-8601 date-time"))
    }
}

/// Enum constants, matched exactly and case-sensitively by name
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumConverter;

impl TypeConverter for EnumConverter {
    fn accepts(&self, field: &FieldDescriptor) -> bool {
        field.field_type == FieldType::Enum
    }

    fn convert(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        field
            .variants
            .iter()
            .find(|variant| **variant == raw.raw)
            .map(|variant| ComparableValue::new(TypedValue::Enum(variant.clone()), raw.ignore_case))
            .ok_or_else(|| QueryError::UnknownEnumValue {
                field: field.name.clone(),
                value: raw.raw.clone(),
            })
    }
}

/// Ordered list of converters; the first accepting converter wins
#[derive(Clone)]
pub struct ConversionChain {
    converters: Vec<Arc<dyn TypeConverter>>,
}

impl fmt::Debug for ConversionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionChain")
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl Default for ConversionChain {
    /// boolean, short, integer, long, float, double, big integer, big decimal,
    /// date, date-time, enum, then UUID
    fn default() -> Self {
        Self {
            converters: vec![
                Arc::new(BooleanConverter),
                Arc::new(ShortConverter),
                Arc::new(IntegerConverter),
                Arc::new(LongConverter),
                Arc::new(FloatConverter),
                Arc::new(DoubleConverter),
                Arc::new(BigIntegerConverter),
                Arc::new(BigDecimalConverter),
                Arc::new(DateConverter),
                Arc::new(DateTimeConverter),
                Arc::new(EnumConverter),
                Arc::new(UuidConverter),
            ],
        }
    }
}

impl ConversionChain {
    /// Chain with no converters: every value resolves to text
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Start a custom chain from the default one
    pub fn builder() -> ConversionChainBuilder {
        ConversionChainBuilder {
            chain: Self::default(),
        }
    }

    /// Resolve one raw value against the target field
    pub fn resolve(
        &self,
        raw: &FilterValue,
        field: &FieldDescriptor,
    ) -> Result<ComparableValue, QueryError> {
        match self
            .converters
            .iter()
            .find(|converter| converter.accepts(field))
        {
            Some(converter) => {
                let resolved = converter.convert(raw, field)?;
                tracing::trace!(field = %field.name, raw = %raw.raw, value = %resolved.value, "Resolved filter value");
                Ok(resolved)
            }
            None => Ok(ComparableValue::new(
                TypedValue::Text(raw.raw.clone()),
                raw.ignore_case,
            )),
        }
    }

    /// Resolve every value of a clause, failing on the first bad one
    pub fn resolve_all(
        &self,
        values: &[FilterValue],
        field: &FieldDescriptor,
    ) -> Result<Vec<ComparableValue>, QueryError> {
        values.iter().map(|raw| self.resolve(raw, field)).collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

/// Builder for a custom converter ordering
#[derive(Debug, Clone)]
pub struct ConversionChainBuilder {
    chain: ConversionChain,
}

impl ConversionChainBuilder {
    /// Start from an empty chain instead of the default one
    pub fn clear(mut self) -> Self {
        self.chain = ConversionChain::empty();
        self
    }

    /// Append a converter with the lowest priority
    pub fn push(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.chain.converters.push(Arc::new(converter));
        self
    }

    /// Insert a converter at `priority`; past the end appends
    pub fn insert(mut self, converter: impl TypeConverter + 'static, priority: usize) -> Self {
        let index = priority.min(self.chain.converters.len());
        self.chain.converters.insert(index, Arc::new(converter));
        self
    }

    /// Remove the converter at `index`, if any
    pub fn remove(mut self, index: usize) -> Self {
        if index < self.chain.converters.len() {
            self.chain.converters.remove(index);
        }
        self
    }

    pub fn build(self) -> ConversionChain {
        self.chain
    }
}
