//! Lexing, validation, redaction and row bounding of a single read statement.

pub mod lexer;
pub mod limit;
pub mod redaction;
pub mod statement;
pub mod validation;

pub use limit::{bound, clamp_limit, count_row_bounds, MAX_ROW_LIMIT, MIN_ROW_LIMIT};
pub use redaction::{redact, RedactionError};
pub use statement::{BoundedQuery, ValidatedQuery};
pub use validation::{validate, Rejection};
