//! Static analysis and rewriting of candidate SQL text.
//!
//! Candidate queries come from an untrusted translation step. Nothing in this crate touches a
//! database: every function here is a deterministic transform or predicate over text.

pub mod sql;
