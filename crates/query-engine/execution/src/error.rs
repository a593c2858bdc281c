//! Errors for query execution.

use std::time::Duration;

use thiserror::Error;

use super::store::{FailureKind, StoreError};

/// Why executing a bounded query failed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unable to acquire a connection: {0}")]
    Acquire(StoreError),
    #[error("the store failed the query: {0}")]
    Store(StoreError),
    #[error("the query did not finish within {0:?}")]
    Timeout(Duration),
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutionError::Acquire(err) | ExecutionError::Store(err) => err.kind,
            ExecutionError::Timeout(_) => FailureKind::Timeout,
        }
    }

    /// A description that is safe to return to the caller. It never includes the driver's
    /// message, which may name tables or columns.
    pub fn summary(&self) -> &'static str {
        match (self, self.kind()) {
            (ExecutionError::Acquire(_), _) => "the data store is unavailable",
            (_, FailureKind::Transport) => "the connection to the data store failed",
            (_, FailureKind::Permission) => "the data store refused the query",
            (_, FailureKind::Syntax) => "the data store could not run the query",
            (_, FailureKind::Timeout) => "the query took too long",
            (_, FailureKind::Other) => "the query failed",
        }
    }
}
