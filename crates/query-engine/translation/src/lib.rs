//! Turning a staff member's question into a candidate query.
//!
//! The language model is treated as an untrusted black box: whatever it returns is only a
//! candidate, and still has to pass validation before anything runs against the store.

pub mod translation;
