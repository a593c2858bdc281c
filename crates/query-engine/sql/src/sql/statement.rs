//! Query text that has passed the safety checks.
//!
//! Neither type can be built from arbitrary text outside this crate: a [`ValidatedQuery`] only
//! comes out of [`super::validate`], and a [`BoundedQuery`] only comes out of
//! [`ValidatedQuery::bound`]. The executor accepts nothing else.

use std::fmt;

use query_engine_metadata::metadata::SchemaDescriptor;

use super::limit;
use super::redaction::{self, RedactionError};
use super::validation::{self, Rejection};

/// A single read statement that passed validation. Trailing semicolons are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery(String);

impl ValidatedQuery {
    pub(crate) fn new(sql: String) -> Self {
        ValidatedQuery(sql)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Strip sensitive columns from the projection unless the caller may see them.
    pub fn redact(
        self,
        descriptor: &SchemaDescriptor,
        allow_sensitive: bool,
    ) -> Result<ValidatedQuery, RedactionError> {
        let rewritten = redaction::redact(&self.0, descriptor, allow_sensitive)?;
        if rewritten == self.0 {
            return Ok(self);
        }
        validation::validate(&rewritten).map_err(RedactionError::InvalidRewrite)
    }

    /// Make sure the statement carries exactly one row bound no larger than the clamped limit.
    pub fn bound(self, requested_limit: i64) -> Result<BoundedQuery, Rejection> {
        let limit = limit::clamp_limit(requested_limit);
        let bounded = limit::bound(&self.0, requested_limit).map_err(Rejection::Lexical)?;
        let validated = validation::validate(&bounded)?;
        match limit::count_row_bounds(validated.as_str()).map_err(Rejection::Lexical)? {
            1 => Ok(BoundedQuery {
                sql: validated.into_string(),
                limit,
            }),
            count => Err(Rejection::RowBound(count)),
        }
    }
}

impl fmt::Display for ValidatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated statement with exactly one top-level row bound. This is what gets executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedQuery {
    sql: String,
    limit: u32,
}

impl BoundedQuery {
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// The upper bound on the number of returned rows.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn into_string(self) -> String {
        self.sql
    }
}

impl fmt::Display for BoundedQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
