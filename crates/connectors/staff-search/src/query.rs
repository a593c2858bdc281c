//! Answer a natural-language question.
//!
//! Each stage runs in its own span, and any failure ends the pipeline with a failure envelope:
//! translate, validate, redact, bound, execute, and finally map the rows into the envelope.

use std::time::Instant;

use serde::Deserialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use query_engine_execution::query::{self as execution, ExecutionOutcome};
use query_engine_metadata::metadata::SchemaDescriptor;
use query_engine_sql::sql::{self, BoundedQuery, MAX_ROW_LIMIT, MIN_ROW_LIMIT};
use query_engine_translation::translation::Translation;

use crate::error::{PipelineError, ServerError};
use crate::response::ResponseEnvelope;
use crate::state::State;

const DEFAULT_ROW_LIMIT: i64 = 100;

/// The body of a question request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchRequest {
    #[serde(alias = "query")]
    pub question: String,
    #[serde(default)]
    pub include_sensitive_info: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_ROW_LIMIT
}

/// A checked question, ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub question: String,
    pub wants_sensitive_fields: bool,
    pub row_limit: u32,
}

impl TryFrom<SearchRequest> for QueryRequest {
    type Error = ServerError;

    fn try_from(request: SearchRequest) -> Result<Self, Self::Error> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ServerError::InvalidRequest(
                "the question must not be empty".to_string(),
            ));
        }
        let row_limit = u32::try_from(request.limit)
            .ok()
            .filter(|limit| (MIN_ROW_LIMIT..=MAX_ROW_LIMIT).contains(limit))
            .ok_or_else(|| {
                ServerError::InvalidRequest(format!(
                    "limit must be between {MIN_ROW_LIMIT} and {MAX_ROW_LIMIT}, got {}",
                    request.limit
                ))
            })?;

        Ok(QueryRequest {
            question: question.to_string(),
            wants_sensitive_fields: request.include_sensitive_info,
            row_limit,
        })
    }
}

/// A query that is ready to run, and what the model said it does.
#[derive(Debug, Clone)]
struct Plan {
    query: BoundedQuery,
    description: String,
}

/// Answer a question with rows from the store.
pub async fn query(state: &State, request: &QueryRequest, received: Instant) -> ResponseEnvelope {
    let request_id = Uuid::new_v4();
    state.metrics.query_total.inc();

    let result = async {
        let plan = plan(state, request).await?;
        let outcome = execute(state, request, &plan).await?;
        Ok::<_, PipelineError>((outcome, plan.description))
    }
    .instrument(info_span!("Answer question", request_id = %request_id))
    .await;

    let elapsed = received.elapsed();
    state
        .metrics
        .query_duration_seconds
        .observe(elapsed.as_secs_f64());

    match result {
        Ok((outcome, description)) => {
            state.metrics.query_success_total.inc();
            tracing::info!(
                request_id = %request_id,
                row_count = outcome.row_count(),
                elapsed_seconds = elapsed.as_secs_f64(),
                "question answered"
            );
            ResponseEnvelope::success(outcome, description, elapsed)
        }
        Err(error) => {
            record_failure(state, &request_id, &error);
            ResponseEnvelope::failure(&error, elapsed)
        }
    }
}

/// Plan the query for a question without running it.
pub async fn explain(state: &State, request: &QueryRequest, received: Instant) -> ResponseEnvelope {
    let request_id = Uuid::new_v4();

    let result = plan(state, request)
        .instrument(info_span!("Explain question", request_id = %request_id))
        .await;

    match result {
        Ok(plan) => {
            state.metrics.explain_total.inc();
            ResponseEnvelope::explained(
                pretty_print(plan.query.as_str()),
                plan.description,
                received.elapsed(),
            )
        }
        Err(error) => {
            record_failure(state, &request_id, &error);
            ResponseEnvelope::failure(&error, received.elapsed())
        }
    }
}

async fn plan(state: &State, request: &QueryRequest) -> Result<Plan, PipelineError> {
    let Translation {
        candidate_query,
        description,
    } = state
        .translator
        .translate(&request.question)
        .instrument(info_span!("Translate question"))
        .await
        .map_err(PipelineError::TranslationUnavailable)?;

    tracing::debug!(candidate_query = %candidate_query, "candidate query");

    let validated = info_span!("Validate query")
        .in_scope(|| sql::validate(&candidate_query))
        .map_err(|rejection| PipelineError::QueryRejected {
            query: candidate_query.clone(),
            rejection,
        })?;

    let redacted = info_span!("Redact query")
        .in_scope(|| validated.redact(state.schema(), request.wants_sensitive_fields))
        .map_err(|error| PipelineError::RedactionConflict {
            query: candidate_query.clone(),
            error,
        })?;

    let redacted_text = redacted.as_str().to_string();
    let query = info_span!("Bound query")
        .in_scope(|| redacted.bound(i64::from(request.row_limit)))
        .map_err(|rejection| PipelineError::QueryRejected {
            query: redacted_text,
            rejection,
        })?;

    Ok(Plan { query, description })
}

async fn execute(
    state: &State,
    request: &QueryRequest,
    plan: &Plan,
) -> Result<ExecutionOutcome, PipelineError> {
    tracing::info!(query = %plan.query, "executing query");

    let mut outcome = execution::execute(state.store.as_ref(), &plan.query, state.execution_timeout)
        .instrument(info_span!("Execute query", limit = plan.query.limit()))
        .await
        .map_err(|error| PipelineError::ExecutionFailed {
            query: plan.query.as_str().to_string(),
            error,
        })?;

    if !request.wants_sensitive_fields {
        drop_sensitive_fields(&mut outcome, state.schema());
    }
    Ok(outcome)
}

/// Remove any field named after a sensitive column. Wildcards over sources the rewriter could
/// not expand end up here.
fn drop_sensitive_fields(outcome: &mut ExecutionOutcome, schema: &SchemaDescriptor) {
    for record in &mut outcome.rows {
        record.retain(|field, _| !schema.is_sensitive(field));
    }
}

fn record_failure(state: &State, request_id: &Uuid, error: &PipelineError) {
    let counter = match error {
        PipelineError::TranslationUnavailable(_) => &state.metrics.translation_failure_total,
        PipelineError::QueryRejected { .. } => &state.metrics.query_rejected_total,
        PipelineError::RedactionConflict { .. } => &state.metrics.redaction_conflict_total,
        PipelineError::ExecutionFailed { .. } => &state.metrics.execution_failure_total,
    };
    counter.inc();

    tracing::error!(
        meta.signal_type = "log",
        event.domain = "staff_search",
        event.name = "Pipeline error",
        name = "Pipeline error",
        request_id = %request_id,
        code = error.code(),
        query = error.query().unwrap_or_default(),
        body = %error,
        error = true,
    );
}

fn pretty_print(query: &str) -> String {
    sqlformat::format(
        query,
        &sqlformat::QueryParams::None,
        sqlformat::FormatOptions::default(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn search_request(value: serde_json::Value) -> SearchRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let request = search_request(json!({ "question": "who applied to 토스?" }));
        assert!(!request.include_sensitive_info);
        assert_eq!(request.limit, 100);
    }

    #[test]
    fn query_is_accepted_as_an_alias() {
        let request = search_request(json!({ "query": "list students", "limit": 5 }));
        let checked = QueryRequest::try_from(request).unwrap();
        assert_eq!(checked.question, "list students");
        assert_eq!(checked.row_limit, 5);
    }

    #[test]
    fn out_of_range_limits_are_refused() {
        for limit in [0, -3, 1001] {
            let request = search_request(json!({ "question": "q", "limit": limit }));
            assert!(matches!(
                QueryRequest::try_from(request),
                Err(ServerError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn blank_questions_are_refused() {
        let request = search_request(json!({ "question": "   " }));
        assert!(QueryRequest::try_from(request).is_err());
    }

    #[test]
    fn explained_queries_are_formatted() {
        let formatted = pretty_print("SELECT name, major FROM educations LIMIT 10");
        assert!(formatted.starts_with("SELECT"));
        assert!(formatted.contains('\n'));
    }
}
