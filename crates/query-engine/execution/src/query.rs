//! Execute a bounded query against the store.

use std::time::Duration;

use futures::TryStreamExt;
use query_engine_sql::sql::BoundedQuery;
use tracing::{info_span, Instrument};

use crate::error::ExecutionError;
use crate::row::{self, Record};
use crate::store::ConnectionProvider;

/// The rows a query returned, and the query text that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub rows: Vec<Record>,
    /// The executed query, echoed back.
    pub query: String,
}

impl ExecutionOutcome {
    /// Always equal to the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Run the query on a freshly acquired connection.
///
/// The connection is dropped, and so released, whether the query succeeds, fails partway
/// through the rows, or times out. Dropping the returned future releases it as well.
pub async fn execute(
    provider: &dyn ConnectionProvider,
    query: &BoundedQuery,
    timeout: Duration,
) -> Result<ExecutionOutcome, ExecutionError> {
    let run = async {
        let mut connection = provider
            .acquire()
            .instrument(info_span!("Acquire connection"))
            .await
            .map_err(ExecutionError::Acquire)?;

        let rows: Vec<Record> = connection
            .fetch(query.as_str())
            .map_ok(row::to_record)
            .try_collect()
            .instrument(info_span!("Fetch rows"))
            .await
            .map_err(ExecutionError::Store)?;

        Ok::<_, ExecutionError>(rows)
    };

    let rows = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| ExecutionError::Timeout(timeout))??;

    tracing::debug!(row_count = rows.len(), "query returned");

    Ok(ExecutionOutcome {
        rows,
        query: query.as_str().to_string(),
    })
}
