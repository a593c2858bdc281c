//! Query execution against the analytical store.
//!
//! Only a [`query_engine_sql::sql::BoundedQuery`] can be executed. Connections come from a
//! [`store::ConnectionProvider`] and are released when dropped, on every exit path.

pub mod error;
pub mod metrics;
pub mod mysql;
pub mod query;
pub mod row;
pub mod store;
