//! The response envelope returned for every question, successful or not.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use query_engine_execution::query::ExecutionOutcome;
use query_engine_execution::row::Record;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_code: Option<String>,
    /// Seconds since the request was received.
    pub execution_time: f64,
}

impl ResponseEnvelope {
    pub fn success(outcome: ExecutionOutcome, description: String, elapsed: Duration) -> Self {
        let count = outcome.row_count();
        ResponseEnvelope {
            success: true,
            data: outcome.rows,
            count,
            query: Some(outcome.query),
            description: Some(description),
            error: None,
            error_code: None,
            execution_time: elapsed.as_secs_f64(),
        }
    }

    /// The planned query, without any rows.
    pub fn explained(query: String, description: String, elapsed: Duration) -> Self {
        ResponseEnvelope {
            success: true,
            data: Vec::new(),
            count: 0,
            query: Some(query),
            description: Some(description),
            error: None,
            error_code: None,
            execution_time: elapsed.as_secs_f64(),
        }
    }

    pub fn failure(error: &PipelineError, elapsed: Duration) -> Self {
        ResponseEnvelope {
            success: false,
            data: Vec::new(),
            count: 0,
            query: error.query().map(ToString::to_string),
            description: None,
            error: Some(error.message()),
            error_code: Some(error.code().to_string()),
            execution_time: elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use query_engine_sql::sql::Rejection;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_counts_the_rows() {
        let mut record = Record::new();
        record.insert("name".to_string(), json!("Kim"));
        let outcome = ExecutionOutcome {
            rows: vec![record.clone(), record],
            query: "SELECT name FROM users LIMIT 2".to_string(),
        };

        let envelope =
            ResponseEnvelope::success(outcome, "names".to_string(), Duration::from_millis(1500));

        assert!(envelope.success);
        assert_eq!(envelope.count, envelope.data.len());
        assert_eq!(envelope.count, 2);
        assert!((envelope.execution_time - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn failures_serialize_without_empty_fields() {
        let error = PipelineError::QueryRejected {
            query: "DELETE FROM users".to_string(),
            rejection: Rejection::NotARead("DELETE".to_string()),
        };
        let envelope = ResponseEnvelope::failure(&error, Duration::from_millis(10));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["count"], json!(0));
        assert_eq!(value["data"], json!([]));
        assert_eq!(value["query"], json!("DELETE FROM users"));
        assert_eq!(value["error_code"], json!("query_rejected"));
        assert!(value.get("description").is_none());
        assert!(value.get("execution_time").is_some());
    }
}
