//! Fakes and helpers shared by the integration tests.

pub mod deployment;
pub mod model;
pub mod router;
pub mod store;
