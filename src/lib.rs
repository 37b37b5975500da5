//! # Viewton
//!
//! Query-parameter driven filtering, sorting, pagination and aggregation for REST APIs.
//!
//! ## Features
//!
//! - **Compact filter grammar**: `price=<>1000`, `name=^john|^jane`, `date=2020-01-01..2020-12-31`
//! - **Typed values**: raw strings resolved against each field's declared type
//! - **Aggregates**: `sum=amount[region,year]`, `avg=price` with group-by
//! - **Pluggable**: custom operator orderings, type converters and predicate backends
//! - **Axum integration**: `SpecQuery` extractor and JSON error responses
//! - **Configuration-Based**: mapper settings and entity metadata via YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use viewton::prelude::*;
//!
//! let metadata = EntityMetadata::new("order")
//!     .typed("status", FieldType::Text)
//!     .typed("amount", FieldType::Double);
//!
//! let store = InMemoryStore::new(metadata);
//! store.insert(serde_json::json!({"status": "OPEN", "amount": 12.5}))?;
//!
//! let params = QueryParamsBuilder::new()
//!     .filter("amount").greater(10)
//!     .count()
//!     .build();
//!
//! let spec = QueryMapper::default().assemble(&params)?;
//! let response = fetch(&store, &spec, ExecutionMode::Sequential).await?;
//! assert_eq!(response.count, Some(1));
//! ```

pub mod config;
pub mod core;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Parsing ===
    pub use crate::core::{
        aggregate::{AggregateExpression, AggregateFunction},
        clause::{ClauseParser, FilterClause, FilterValue},
        convert::{ConversionChain, TypeConverter},
        operator::{OperatorDescriptor, OperatorKind, OperatorRegistry},
        query::{QueryMapper, QueryParams, QuerySpec, SortDirection, SortEntry},
    };

    // === Building ===
    pub use crate::core::builder::QueryParamsBuilder;

    // === Types ===
    pub use crate::core::{
        entity::EntityMetadata,
        field::{ComparableValue, FieldDescriptor, FieldType, TypedValue},
    };

    // === Execution ===
    pub use crate::core::{
        predicate::PredicateBackend,
        query::{PaginationMeta, QueryResponse},
        service::{QueryService, fetch},
    };

    // === Errors ===
    pub use crate::core::error::{ErrorResponse, QueryError};

    // === Axum ===
    pub use crate::core::extractors::SpecQuery;

    // === Storage ===
    pub use crate::storage::{InMemoryBackend, InMemoryStore};

    // === Config ===
    pub use crate::config::{ExecutionMode, MapperConfig, SortConvention};

    // === External dependencies ===
    pub use async_trait::async_trait;
}
