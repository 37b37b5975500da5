//! Core module containing the parsing engine and its collaborator contracts

pub mod aggregate;
pub mod builder;
pub mod clause;
pub mod convert;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod field;
pub mod operator;
pub mod predicate;
pub mod query;
pub mod service;

pub use aggregate::{AggregateExpression, AggregateFunction};
pub use builder::{FilterBuilder, OrBuilder, QueryParamsBuilder};
pub use clause::{ClauseParser, FilterClause, FilterValue};
pub use convert::{ConversionChain, ConversionChainBuilder, TypeConverter};
pub use entity::EntityMetadata;
pub use error::{ErrorResponse, QueryError};
pub use extractors::SpecQuery;
pub use field::{ComparableValue, FieldDescriptor, FieldType, TypedValue};
pub use operator::{OperatorDescriptor, OperatorKind, OperatorRegistry, OperatorRegistryBuilder};
pub use predicate::PredicateBackend;
pub use query::{
    PaginationMeta, QueryMapper, QueryMapperBuilder, QueryParams, QueryResponse, QuerySpec,
    SortDirection, SortEntry,
};
pub use service::{QueryService, fetch};
