//! Tests of the explain, schema, health and metrics routes.

use axum::http::StatusCode;
use serde_json::json;
use similar_asserts::assert_eq;

use staff_search::response::ResponseEnvelope;
use tests_common::model::ScriptedModel;
use tests_common::router::create_app;
use tests_common::store::{applicants, MemoryStore};

#[tokio::test]
async fn explain_plans_without_executing() {
    let app = create_app(
        ScriptedModel::returning(
            "SELECT u.name, u.email, h.company, h.job FROM users u JOIN hopes h ON u.user_id = h.user_id",
            "Hoped-for companies",
        ),
        MemoryStore::with_rows(applicants(5, "토스", "final_accepted")),
    )
    .await;

    let response = app
        .client
        .post("/api/staff-ai-search/explain")
        .json(&json!({ "question": "which companies do students hope for?", "limit": 30 }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let envelope: ResponseEnvelope = response.json().await;

    assert!(envelope.success, "{envelope:?}");
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.description.as_deref(), Some("Hoped-for companies"));
    let query = envelope.query.expect("query");
    assert!(query.contains("LIMIT"));
    assert!(query.contains("30"));
    assert!(!query.contains("email"));
    assert!(app.store.executed().is_empty());
}

#[tokio::test]
async fn explain_reports_rejections() {
    let app = create_app(
        ScriptedModel::returning("UPDATE users SET name = 'x'", "rename"),
        MemoryStore::default(),
    )
    .await;

    let response = app
        .client
        .post("/api/staff-ai-search/explain")
        .json(&json!({ "question": "rename everyone" }))
        .send()
        .await;
    let envelope: ResponseEnvelope = response.json().await;

    assert!(!envelope.success);
    assert_eq!(envelope.error_code.as_deref(), Some("query_rejected"));
}

#[tokio::test]
async fn schema_lists_the_tables_and_vocabulary() {
    let app = create_app(ScriptedModel::failing(), MemoryStore::default()).await;

    let response = app.client.get("/api/staff-ai-search/schema").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let schema: serde_json::Value = response.json().await;

    let tables: Vec<&str> = schema["tables"]
        .as_object()
        .expect("tables")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        tables,
        vec![
            "users",
            "educations",
            "company_applications",
            "job_reviews",
            "hopes"
        ]
    );
    assert_eq!(
        schema["tables"]["users"]["columns"]["email"]["sensitive"],
        json!(true)
    );
    assert_eq!(schema["glossary"]["companyAliases"]["삼성"], json!("삼성전자"));
}

#[tokio::test]
async fn health_round_trips_to_the_store() {
    let app = create_app(ScriptedModel::failing(), MemoryStore::default()).await;

    let response = app.client.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.executed(), vec!["SELECT 1".to_string()]);
    assert_eq!(app.store.open_connections(), 0);
}

#[tokio::test]
async fn health_fails_when_the_store_is_unreachable() {
    let app = create_app(ScriptedModel::failing(), MemoryStore::unreachable()).await;

    let response = app.client.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_count_outcomes() {
    let app = create_app(
        ScriptedModel::returning("SELECT name FROM users", "names"),
        MemoryStore::with_rows(Vec::new()),
    )
    .await;

    let response = app
        .client
        .post("/api/staff-ai-search")
        .json(&json!({ "question": "names" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let metrics = app.client.get("/metrics").send().await.text().await;
    assert!(metrics.contains("staff_search_query_total 1"), "{metrics}");
    assert!(metrics.contains("staff_search_query_success_total 1"));
    assert!(metrics.contains("staff_search_query_rejected_total 0"));
}
