//! Typed error handling for query parsing and resolution
//!
//! Every failure the parser, the type conversion chain or a backend can produce is a
//! variant of [`QueryError`]. Parsing is deterministic, so none of these errors are
//! retried: they propagate to the caller, which usually turns them into a 4xx response
//! through the [`IntoResponse`] implementation below.
//!
//! # Example
//!
//! ```rust,ignore
//! use viewton::prelude::*;
//!
//! match mapper.assemble(&params) {
//!     Ok(spec) => run(spec),
//!     Err(QueryError::InvalidRange { field, .. }) => {
//!         println!("bad range on {}", field);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning request parameters into a query spec
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// No registered operator token was found in the raw condition
    #[error("Unable to parse condition for '{field}': unknown operator in '{condition}'")]
    UnrecognizedOperator { field: String, condition: String },

    /// A range condition did not split into exactly two bounds
    #[error("Invalid range for '{field}': expected 2 bounds, found {segments} in '{condition}'")]
    InvalidRange {
        field: String,
        condition: String,
        segments: usize,
    },

    /// An OR condition produced no usable alternatives
    #[error("Invalid OR condition for '{field}': '{condition}'")]
    InvalidOrSyntax { field: String, condition: String },

    /// A raw value could not be parsed with the target type's literal grammar
    #[error("Invalid value '{value}' for field '{field}': expected {expected}")]
    ValueFormat {
        field: String,
        value: String,
        expected: String,
    },

    /// A raw value does not name any constant of the target enum
    #[error("Unknown value '{value}' for enum field '{field}'")]
    UnknownEnumValue { field: String, value: String },

    /// An aggregate expression is missing its attribute list
    #[error("Invalid '{key}' operation syntax: '{value}'")]
    InvalidAggregateSyntax { key: String, value: String },

    /// SUM or AVG requested over a field that does not hold numbers
    #[error("Cannot {function} non-numeric field '{field}'")]
    NonNumericAggregate { field: String, function: String },

    /// `page` or `page_size` is not a usable number
    #[error("Invalid '{key}' value '{value}': {reason}")]
    InvalidPagination {
        key: String,
        value: String,
        reason: String,
    },

    /// The query string itself could not be decoded
    #[error("Malformed query string: {message}")]
    MalformedQuery { message: String },

    /// A clause, sort entry or attribute names a field the entity does not declare
    #[error("Unknown field '{field}' for entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// Mapper or registry misconfiguration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Backend failure while executing a query
    #[error("Storage error: {message}")]
    Storage { message: String },
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl QueryError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryError::Config { .. } | QueryError::Storage { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::UnrecognizedOperator { .. } => "UNRECOGNIZED_OPERATOR",
            QueryError::InvalidRange { .. } => "INVALID_RANGE",
            QueryError::InvalidOrSyntax { .. } => "INVALID_OR_SYNTAX",
            QueryError::ValueFormat { .. } => "VALUE_FORMAT_ERROR",
            QueryError::UnknownEnumValue { .. } => "UNKNOWN_ENUM_VALUE",
            QueryError::InvalidAggregateSyntax { .. } => "INVALID_AGGREGATE_SYNTAX",
            QueryError::NonNumericAggregate { .. } => "NON_NUMERIC_AGGREGATE",
            QueryError::InvalidPagination { .. } => "INVALID_PAGINATION",
            QueryError::MalformedQuery { .. } => "MALFORMED_QUERY",
            QueryError::UnknownField { .. } => "UNKNOWN_FIELD",
            QueryError::Config { .. } => "CONFIG_ERROR",
            QueryError::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// The request parameter the error originates from, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryError::UnrecognizedOperator { field, .. }
            | QueryError::InvalidRange { field, .. }
            | QueryError::InvalidOrSyntax { field, .. }
            | QueryError::ValueFormat { field, .. }
            | QueryError::UnknownEnumValue { field, .. }
            | QueryError::NonNumericAggregate { field, .. }
            | QueryError::UnknownField { field, .. } => Some(field),
            QueryError::InvalidAggregateSyntax { key, .. }
            | QueryError::InvalidPagination { key, .. } => Some(key),
            QueryError::MalformedQuery { .. }
            | QueryError::Config { .. }
            | QueryError::Storage { .. } => None,
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            QueryError::ValueFormat {
                field,
                value,
                expected,
            } => Some(serde_json::json!({
                "field": field,
                "value": value,
                "expected": expected
            })),
            QueryError::UnknownEnumValue { field, value } => Some(serde_json::json!({
                "field": field,
                "value": value
            })),
            _ => self
                .field()
                .map(|field| serde_json::json!({ "field": field })),
        }
    }

    pub(crate) fn value_format(field: &str, value: &str, expected: &str) -> Self {
        QueryError::ValueFormat {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_client_errors() {
        let err = QueryError::InvalidRange {
            field: "price".to_string(),
            condition: "1..5..9".to_string(),
            segments: 3,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_RANGE");
        assert_eq!(err.field(), Some("price"));
    }

    #[test]
    fn test_storage_error_is_server_error() {
        let err = QueryError::Storage {
            message: "lock poisoned".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_value_format_details() {
        let err = QueryError::value_format("age", "abc", "integer");
        let response = err.to_response();
        assert_eq!(response.code, "VALUE_FORMAT_ERROR");
        assert_eq!(
            response.message,
            "Invalid value 'abc' for field 'age': expected integer"
        );
        let details = response.details.expect("details should be present");
        assert_eq!(details["field"], "age");
        assert_eq!(details["value"], "abc");
    }

    #[test]
    fn test_config_error_has_no_details() {
        let err = QueryError::Config {
            message: "missing registry".to_string(),
        };
        assert!(err.to_response().details.is_none());
    }
}
