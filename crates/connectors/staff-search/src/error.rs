//! Errors surfaced by the gateway.
//!
//! Failures inside the question pipeline become a [`PipelineError`] and are reported inside a
//! well-formed response envelope. Only problems with the HTTP request itself become a
//! [`ServerError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use query_engine_execution::error::ExecutionError;
use query_engine_sql::sql::{RedactionError, Rejection};
use query_engine_translation::translation::TranslationError;

/// A terminal failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("translation failed: {0}")]
    TranslationUnavailable(TranslationError),
    #[error("query rejected: {rejection}")]
    QueryRejected { query: String, rejection: Rejection },
    #[error("redaction failed: {error}")]
    RedactionConflict { query: String, error: RedactionError },
    #[error("execution failed: {error}")]
    ExecutionFailed { query: String, error: ExecutionError },
}

impl PipelineError {
    /// The stable, machine readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::TranslationUnavailable(_) => "translation_unavailable",
            PipelineError::QueryRejected { .. } => "query_rejected",
            PipelineError::RedactionConflict { .. } => "redaction_conflict",
            PipelineError::ExecutionFailed { .. } => "execution_failed",
        }
    }

    /// The last query text known when the failure happened.
    pub fn query(&self) -> Option<&str> {
        match self {
            PipelineError::TranslationUnavailable(_) => None,
            PipelineError::QueryRejected { query, .. }
            | PipelineError::RedactionConflict { query, .. }
            | PipelineError::ExecutionFailed { query, .. } => Some(query),
        }
    }

    /// A message that is safe to show the caller. Store errors are summarized, and language
    /// model transport details are left out.
    pub fn message(&self) -> String {
        match self {
            PipelineError::TranslationUnavailable(TranslationError::EmptyQuestion) => {
                "the question is empty".to_string()
            }
            PipelineError::TranslationUnavailable(TranslationError::Timeout(_)) => {
                "the language model did not answer in time".to_string()
            }
            PipelineError::TranslationUnavailable(_) => {
                "the question could not be translated into a query".to_string()
            }
            PipelineError::QueryRejected { rejection, .. } => {
                format!("the generated query was rejected: {rejection}")
            }
            PipelineError::RedactionConflict { .. } => {
                "the query only selects sensitive fields, which this request may not see"
                    .to_string()
            }
            PipelineError::ExecutionFailed { error, .. } => {
                format!("the query could not be executed: {}", error.summary())
            }
        }
    }
}

/// A request the gateway refuses to process at all.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct JsonErrorResponse {
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();

        tracing::warn!(
            meta.signal_type = "log",
            event.domain = "staff_search",
            event.name = "Request error",
            name = "Request error",
            body = %message,
            status = %status,
            error = true,
        );
        (status, Json(JsonErrorResponse { message })).into_response()
    }
}
