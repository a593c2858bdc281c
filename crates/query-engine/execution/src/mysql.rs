//! The MySQL store, through a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::mysql::{MySql, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::store::{
    ConnectionProvider, FailureKind, StoreConnection, StoreError, StoreRow, StoreValue,
};

/// Put every pooled session into read-only mode, as a second line of defence behind the
/// validator.
const READ_ONLY_SESSION: &str = "SET SESSION TRANSACTION READ ONLY";

/// Pool tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

/// Connections to a MySQL store, handed out read-only.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Create the pool. No connection is made until the first acquisition.
    pub fn connect_lazy(connection_uri: &str, options: &PoolOptions) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .idle_timeout(options.idle_timeout)
            .max_lifetime(options.max_lifetime)
            .after_connect(|connection, _meta| {
                Box::pin(async move {
                    sqlx::query(READ_ONLY_SESSION).execute(connection).await?;
                    Ok(())
                })
            })
            .connect_lazy(connection_uri)?;
        Ok(MySqlStore { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for MySqlStore {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let connection = self.pool.acquire().await.map_err(classify)?;
        Ok(Box::new(MySqlConnection { connection }))
    }
}

/// A pooled connection; returned to the pool on drop.
struct MySqlConnection {
    connection: PoolConnection<MySql>,
}

impl StoreConnection for MySqlConnection {
    fn fetch<'c>(&'c mut self, sql: &'c str) -> BoxStream<'c, Result<StoreRow, StoreError>> {
        sqlx::query(sql)
            .fetch(&mut *self.connection)
            .map(|row| row.map_err(classify).and_then(|row| decode_row(&row)))
            .boxed()
    }
}

fn decode_row(row: &MySqlRow) -> Result<StoreRow, StoreError> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_value(row, column.ordinal(), column.type_info().name())
                .map_err(|err| {
                    StoreError::new(
                        FailureKind::Other,
                        format!("unable to decode column '{}': {err}", column.name()),
                    )
                })?;
            Ok((column.name().to_string(), value))
        })
        .collect::<Result<Vec<_>, StoreError>>()
        .map(StoreRow::new)
}

/// Decode one column by the type the server reported for it.
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<StoreValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(StoreValue::Null);
    }

    let value = match type_name {
        "BOOLEAN" => StoreValue::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            StoreValue::Int(row.try_get(index)?)
        }
        "YEAR" => StoreValue::Int(row.try_get_unchecked(index)?),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => StoreValue::UInt(row.try_get(index)?),
        "BIT" => StoreValue::UInt(row.try_get_unchecked(index)?),
        "FLOAT" | "DOUBLE" => StoreValue::Float(row.try_get(index)?),
        "DECIMAL" => StoreValue::Decimal(row.try_get_unchecked(index)?),
        "DATE" => StoreValue::Date(row.try_get(index)?),
        "TIME" => StoreValue::Time(row.try_get(index)?),
        "DATETIME" => StoreValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => StoreValue::Timestamp(row.try_get(index)?),
        "JSON" => StoreValue::Json(row.try_get(index)?),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            StoreValue::Bytes(row.try_get(index)?)
        }
        _ => StoreValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

/// Sort a driver error into the classes callers are told about.
pub fn classify(err: sqlx::Error) -> StoreError {
    let kind = match &err {
        sqlx::Error::Database(database_error) => database_error
            .try_downcast_ref::<MySqlDatabaseError>()
            .map_or(FailureKind::Other, |mysql_error| {
                classify_server_error(mysql_error.number())
            }),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => FailureKind::Transport,
        sqlx::Error::PoolTimedOut => FailureKind::Timeout,
        _ => FailureKind::Other,
    };
    StoreError::new(kind, err.to_string())
}

/// MySQL server error numbers.
fn classify_server_error(number: u16) -> FailureKind {
    match number {
        // access denied, command or column denied, read-only transaction, read-only server
        1044 | 1045 | 1142 | 1143 | 1227 | 1290 | 1792 => FailureKind::Permission,
        // parse error, unknown table or column, ambiguous column, wrong group by
        1054 | 1064 | 1052 | 1055 | 1146 | 1149 => FailureKind::Syntax,
        // statement execution time exceeded, lock wait timeout, query interrupted
        1205 | 1317 | 3024 => FailureKind::Timeout,
        // server gone away, lost connection
        2006 | 2013 => FailureKind::Transport,
        _ => FailureKind::Other,
    }
}
