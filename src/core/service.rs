//! Query service contract and the list/count/aggregate fan-out

use async_trait::async_trait;
use std::future::Future;

use crate::config::ExecutionMode;
use crate::core::error::QueryError;
use crate::core::query::{QueryResponse, QuerySpec};

/// Service executing query specs against one entity type
///
/// Implementations own the storage mechanism; the framework only hands them assembled
/// specs. Every method receives the same immutable spec.
#[async_trait]
pub trait QueryService<T>: Send + Sync {
    /// The requested page of rows
    async fn list(&self, spec: &QuerySpec) -> Result<Vec<T>, QueryError>;

    /// Number of rows matching the filters, ignoring pagination
    async fn count(&self, spec: &QuerySpec) -> Result<u64, QueryError>;

    /// Rows of `spec.sum`, one per group
    async fn sum(&self, spec: &QuerySpec) -> Result<Vec<T>, QueryError>;

    /// Rows of `spec.avg`, one per group
    async fn avg(&self, spec: &QuerySpec) -> Result<Vec<T>, QueryError>;
}

/// Run the branches a spec asks for and combine them into one response
///
/// The list branch always runs; count, sum and avg run when requested. In concurrent
/// mode all branches are polled together and awaited to completion even when one fails;
/// the reported error is the first one in list, count, sum, avg order.
pub async fn fetch<T, S>(
    service: &S,
    spec: &QuerySpec,
    mode: ExecutionMode,
) -> Result<QueryResponse<T>, QueryError>
where
    S: QueryService<T> + ?Sized,
    T: Send,
{
    tracing::debug!(
        ?mode,
        count = spec.count,
        sum = spec.is_sum(),
        avg = spec.is_avg(),
        "Fetching query results"
    );

    match mode {
        ExecutionMode::Sequential => {
            let list = service.list(spec).await?;
            let count = when(spec.count, service.count(spec)).await?;
            let sum = when(spec.is_sum(), service.sum(spec)).await?;
            let avg = when(spec.is_avg(), service.avg(spec)).await?;
            Ok(QueryResponse {
                list,
                sum,
                avg,
                count,
            })
        }
        ExecutionMode::Concurrent => {
            let (list, count, sum, avg) = futures::join!(
                service.list(spec),
                when(spec.count, service.count(spec)),
                when(spec.is_sum(), service.sum(spec)),
                when(spec.is_avg(), service.avg(spec)),
            );
            Ok(QueryResponse {
                list: list?,
                count: count?,
                sum: sum?,
                avg: avg?,
            })
        }
    }
}

async fn when<T>(
    enabled: bool,
    branch: impl Future<Output = Result<T, QueryError>>,
) -> Result<Option<T>, QueryError> {
    if enabled {
        branch.await.map(Some)
    } else {
        Ok(None)
    }
}
