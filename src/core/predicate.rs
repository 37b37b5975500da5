//! Contract for rendering filter clauses into backend-native predicates
//!
//! A backend receives each clause together with the declared field it targets and the
//! conversion chain, and returns whatever its query engine understands: a SQL fragment,
//! a document filter, or a closure over in-memory rows. The rendering rules every
//! backend must honor are:
//!
//! - `EQUAL` is an exact comparison, or a LIKE pattern (`%`, `_`) when the field is textual
//! - each value's `ignore_case` flag is honored by case-folding both sides
//! - the literal `null` is rendered as an IS NULL test
//! - `NOT_EQUAL` is the negation of `EQUAL`
//! - `RANGE` is an inclusive between
//! - `OR` is a disjunction of `EQUAL` predicates

use crate::core::clause::{FilterClause, FilterValue};
use crate::core::convert::ConversionChain;
use crate::core::entity::EntityMetadata;
use crate::core::error::QueryError;
use crate::core::field::FieldDescriptor;

/// Literal requesting an IS NULL test
pub const NULL_LITERAL: &str = "null";

/// Renders [`FilterClause`]s into predicates of one query engine
pub trait PredicateBackend: Send + Sync {
    /// Native predicate type
    type Predicate;

    /// Render one clause against its target field
    fn to_predicate(
        &self,
        clause: &FilterClause,
        field: &FieldDescriptor,
        resolver: &ConversionChain,
    ) -> Result<Self::Predicate, QueryError>;

    /// Render every clause, resolving field names through `metadata`
    ///
    /// Fails with [`QueryError::UnknownField`] on the first clause naming an undeclared
    /// field.
    fn to_predicates(
        &self,
        clauses: &[FilterClause],
        metadata: &EntityMetadata,
        resolver: &ConversionChain,
    ) -> Result<Vec<Self::Predicate>, QueryError> {
        clauses
            .iter()
            .map(|clause| {
                let field = metadata.require(&clause.field_name)?;
                self.to_predicate(clause, field, resolver)
            })
            .collect()
    }
}

/// Whether a raw value is the IS NULL literal
pub fn is_null_literal(value: &FilterValue) -> bool {
    value.raw == NULL_LITERAL
}
