//! A gateway that answers staff questions in natural language with rows from the analytical
//! store.
//!
//! A question is translated into a candidate query by a language model, checked, stripped of
//! sensitive columns, bounded, executed read-only, and returned inside a [`response::ResponseEnvelope`].

pub mod error;
pub mod health;
pub mod query;
pub mod response;
pub mod routes;
pub mod state;
