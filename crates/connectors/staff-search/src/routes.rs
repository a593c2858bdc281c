//! The HTTP routes of the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{self, rejection::JsonRejection},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};

use query_engine_metadata::metadata::SchemaDescriptor;

use crate::error::ServerError;
use crate::health;
use crate::query::{self, QueryRequest, SearchRequest};
use crate::response::ResponseEnvelope;
use crate::state::State;

pub const SEARCH_PATH: &str = "/api/staff-ai-search";

/// Build the router over a shared state.
pub fn create_router(state: Arc<State>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route(SEARCH_PATH, post(post_search))
        .route(&format!("{SEARCH_PATH}/explain"), post(post_explain))
        .route(&format!("{SEARCH_PATH}/schema"), get(get_schema))
        .with_state(state)
}

async fn post_search(
    extract::State(state): extract::State<Arc<State>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, ServerError> {
    let received = Instant::now();
    let request = checked_request(body)?;
    Ok(Json(query::query(&state, &request, received).await))
}

async fn post_explain(
    extract::State(state): extract::State<Arc<State>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, ServerError> {
    let received = Instant::now();
    let request = checked_request(body)?;
    Ok(Json(query::explain(&state, &request, received).await))
}

async fn get_schema(extract::State(state): extract::State<Arc<State>>) -> Json<SchemaDescriptor> {
    Json(state.schema().clone())
}

async fn get_health(
    extract::State(state): extract::State<Arc<State>>,
) -> Result<StatusCode, ServerError> {
    health::health_check(state.store.as_ref())
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|err| {
            tracing::error!(
                meta.signal_type = "log",
                event.domain = "staff_search",
                event.name = "Health check error",
                name = "Health check error",
                body = %err,
                error = true,
            );
            ServerError::Unavailable(format!("the data store is unavailable ({})", err.kind))
        })
}

async fn get_metrics(
    extract::State(state): extract::State<Arc<State>>,
) -> Result<impl IntoResponse, ServerError> {
    state.fetch_metrics();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&state.metrics_registry.gather(), &mut buffer)
        .map_err(|err| ServerError::Internal(err.to_string()))?;
    let body = String::from_utf8(buffer).map_err(|err| ServerError::Internal(err.to_string()))?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

fn checked_request(
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<QueryRequest, ServerError> {
    let Json(request) = body.map_err(|rejection| ServerError::InvalidRequest(rejection.body_text()))?;
    QueryRequest::try_from(request)
}
