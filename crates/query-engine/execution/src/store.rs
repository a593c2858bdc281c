//! The seam between query execution and the store driver.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// A value as the store returned it, before conversion into a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact decimals keep their textual form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Json(serde_json::Value),
}

/// One result row: column names and values in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreRow {
    pub columns: Vec<(String, StoreValue)>,
}

impl StoreRow {
    pub fn new(columns: Vec<(String, StoreValue)>) -> Self {
        StoreRow { columns }
    }
}

/// The broad class of a store failure. Only this, never the driver's message, is shown to
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection could not be made or was lost.
    Transport,
    /// The store refused the statement for lack of privileges, including writes on a
    /// read-only session.
    Permission,
    /// The store could not compile the statement, e.g. an unknown column.
    Syntax,
    Timeout,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Transport => "transport",
            FailureKind::Permission => "permission",
            FailureKind::Syntax => "syntax",
            FailureKind::Timeout => "timeout",
            FailureKind::Other => "other",
        })
    }
}

/// An error reported by the store driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct StoreError {
    pub kind: FailureKind,
    /// The driver's message. Logged, never returned to the caller.
    pub message: String,
}

impl StoreError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        StoreError {
            kind,
            message: message.into(),
        }
    }
}

/// A connection checked out for a single execution. Dropping it returns it to its provider.
pub trait StoreConnection: Send {
    /// Run one statement and stream its rows.
    fn fetch<'c>(&'c mut self, sql: &'c str) -> BoxStream<'c, Result<StoreRow, StoreError>>;
}

/// Hands out read-only connections to the store.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}
