//! Axum extractor turning a request's query string into a [`QuerySpec`]
//!
//! The mapper is taken from the router state, so any state type that can hand out an
//! `Arc<QueryMapper>` works:
//!
//! ```rust,ignore
//! async fn list_orders(
//!     State(state): State<AppState>,
//!     SpecQuery(spec): SpecQuery,
//! ) -> Result<Json<QueryResponse<Value>>, QueryError> {
//!     Ok(Json(fetch(&state.orders, &spec, state.mode).await?))
//! }
//! ```
//!
//! Parse failures reject the request with the JSON error body of [`QueryError`].

use axum::extract::{FromRef, FromRequestParts, Query};
use axum::http::request::Parts;
use std::sync::Arc;

use crate::core::error::QueryError;
use crate::core::query::{QueryMapper, QueryParams, QuerySpec};

/// Query spec assembled from the request URI
#[derive(Debug, Clone)]
pub struct SpecQuery(pub QuerySpec);

impl SpecQuery {
    pub fn into_inner(self) -> QuerySpec {
        self.0
    }
}

impl<S> FromRequestParts<S> for SpecQuery
where
    Arc<QueryMapper>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = QueryError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let mapper = Arc::<QueryMapper>::from_ref(state);
        let params = params_from_parts(parts)?;
        mapper.assemble(&params).map(SpecQuery)
    }
}

/// Decode the raw parameters of a request
pub fn params_from_parts(parts: &Parts) -> Result<QueryParams, QueryError> {
    Query::<QueryParams>::try_from_uri(&parts.uri)
        .map(|Query(params)| params)
        .map_err(|rejection| QueryError::MalformedQuery {
            message: rejection.body_text(),
        })
}
