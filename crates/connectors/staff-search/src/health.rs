//! Health check endpoint for the gateway.

use futures::TryStreamExt;

use query_engine_execution::store::{ConnectionProvider, FailureKind, StoreError};

/// Check that the store can be reached and answers a trivial query.
pub async fn health_check(store: &dyn ConnectionProvider) -> Result<(), StoreError> {
    let mut connection = store.acquire().await?;
    let rows: Vec<_> = connection.fetch("SELECT 1").try_collect().await?;

    if rows.len() == 1 {
        Ok(())
    } else {
        Err(StoreError::new(
            FailureKind::Other,
            format!("health check returned {} rows", rows.len()),
        ))
    }
}
