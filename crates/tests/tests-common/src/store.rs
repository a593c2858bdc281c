//! An in-memory store that counts the connections it has handed out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use query_engine_execution::store::{
    ConnectionProvider, FailureKind, StoreConnection, StoreError, StoreRow, StoreValue,
};

/// Serves a fixed set of rows, truncated to the statement's `LIMIT`, whatever the statement.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Vec<StoreRow>,
    fail_after: Option<usize>,
    unreachable: bool,
    open: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn with_rows(rows: Vec<StoreRow>) -> Self {
        MemoryStore {
            rows,
            ..MemoryStore::default()
        }
    }

    /// Lose the connection after this many rows have been streamed.
    #[must_use]
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    /// Refuse every acquisition.
    pub fn unreachable() -> Self {
        MemoryStore {
            unreachable: true,
            ..MemoryStore::default()
        }
    }

    /// Connections acquired and not yet released.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Every statement run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock").clone()
    }
}

#[async_trait]
impl ConnectionProvider for MemoryStore {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        if self.unreachable {
            return Err(StoreError::new(
                FailureKind::Transport,
                "Can't connect to MySQL server on 'analytics-db'",
            ));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            store: self.clone(),
        }))
    }
}

struct MemoryConnection {
    store: MemoryStore,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.store.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StoreConnection for MemoryConnection {
    fn fetch<'c>(&'c mut self, sql: &'c str) -> BoxStream<'c, Result<StoreRow, StoreError>> {
        self.store
            .executed
            .lock()
            .expect("executed lock")
            .push(sql.to_string());

        if sql.trim().eq_ignore_ascii_case("SELECT 1") {
            let row = StoreRow::new(vec![("1".to_string(), StoreValue::Int(1))]);
            return stream::iter(vec![Ok(row)]).boxed();
        }

        let limit = trailing_limit(sql).unwrap_or(usize::MAX);
        let mut items: Vec<Result<StoreRow, StoreError>> = self
            .store
            .rows
            .iter()
            .take(limit)
            .take(self.store.fail_after.unwrap_or(usize::MAX))
            .cloned()
            .map(Ok)
            .collect();
        if self.store.fail_after.is_some() {
            items.push(Err(StoreError::new(
                FailureKind::Transport,
                "Lost connection to MySQL server during query",
            )));
        }
        stream::iter(items).boxed()
    }
}

/// The row count of a trailing `LIMIT n` or `LIMIT offset, n`.
fn trailing_limit(sql: &str) -> Option<usize> {
    let upper = sql.to_ascii_uppercase();
    let position = upper.rfind("LIMIT")?;
    let clause = sql[position + "LIMIT".len()..].trim().trim_end_matches(';');
    let count = clause.rsplit(',').next()?.split_whitespace().next()?;
    count.parse().ok()
}

/// A row shaped like a join of `users` and `company_applications`, sensitive columns included.
pub fn applicant_row(index: usize, company: &str, status: &str) -> StoreRow {
    StoreRow::new(vec![
        ("user_id".to_string(), StoreValue::Text(format!("student{index:03}"))),
        ("name".to_string(), StoreValue::Text(format!("Student {index}"))),
        (
            "email".to_string(),
            StoreValue::Text(format!("student{index}@example.com")),
        ),
        (
            "phone".to_string(),
            StoreValue::Text(format!("010-0000-{index:04}")),
        ),
        ("company_name".to_string(), StoreValue::Text(company.to_string())),
        ("position".to_string(), StoreValue::Text("Backend Engineer".to_string())),
        ("status".to_string(), StoreValue::Text(status.to_string())),
    ])
}

/// `count` applicant rows.
pub fn applicants(count: usize, company: &str, status: &str) -> Vec<StoreRow> {
    (0..count)
        .map(|index| applicant_row(index, company, status))
        .collect()
}
