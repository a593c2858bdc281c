//! The security gate every candidate query passes before anything touches the store.
//!
//! Two independent layers must both accept:
//!
//! 1. a textual screen: the statement starts with `SELECT`, contains no denylisted keyword as a
//!    whole word, no comment delimiter, and no second statement after a semicolon;
//! 2. a structural check: the text parses as exactly one MySQL query whose body is a plain
//!    `SELECT` without set operations or locking clauses.
//!
//! Both layers are pure functions of the input text.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use super::lexer::LexError;
use super::statement::ValidatedQuery;

/// Keywords that cause rejection wherever they appear as a whole word.
pub const DENYLISTED_KEYWORDS: &[&str] = &[
    // schema changes
    "DROP",
    "ALTER",
    "CREATE",
    "TRUNCATE",
    "RENAME",
    // data changes
    "DELETE",
    "INSERT",
    "UPDATE",
    "REPLACE",
    "MERGE",
    "LOAD",
    "HANDLER",
    // privileges and execution
    "GRANT",
    "REVOKE",
    "EXEC",
    "EXECUTE",
    "CALL",
    "PREPARE",
    "DEALLOCATE",
    "LOCK",
    "UNLOCK",
    // writing results somewhere else
    "INTO",
    "OUTFILE",
    "DUMPFILE",
    // chaining a second read
    "UNION",
    "INTERSECT",
    "EXCEPT",
    // resource exhaustion
    "SLEEP",
    "BENCHMARK",
];

/// Comment openers and closers, which could truncate or hide part of a statement.
pub const COMMENT_DELIMITERS: &[&str] = &["--", "/*", "*/", "#"];

const READ_KEYWORD: &str = "SELECT";

static DENYLIST: Lazy<Regex> = Lazy::new(|| {
    let alternatives = DENYLISTED_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).expect("denylist pattern is valid")
});

/// Why a candidate query was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("the query is empty")]
    Empty,
    #[error("the query must start with SELECT, but starts with '{0}'")]
    NotARead(String),
    #[error("the query contains the forbidden keyword '{0}'")]
    ForbiddenKeyword(String),
    #[error("the query contains the comment delimiter '{0}'")]
    CommentDelimiter(String),
    #[error("the query contains more than one statement")]
    MultipleStatements,
    #[error("the query could not be parsed: {0}")]
    Unparseable(String),
    #[error("the query is not a plain read: {0}")]
    NotAPlainRead(&'static str),
    #[error("the query could not be tokenized: {0}")]
    Lexical(LexError),
    #[error("the query must carry exactly one row bound, found {0}")]
    RowBound(usize),
}

/// Accept or reject a candidate query.
pub fn validate(candidate: &str) -> Result<ValidatedQuery, Rejection> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return Err(Rejection::Empty);
    }

    let first_keyword = first_keyword(trimmed);
    if !first_keyword.eq_ignore_ascii_case(READ_KEYWORD) {
        return Err(Rejection::NotARead(first_keyword.to_string()));
    }

    if let Some(found) = DENYLIST.find(trimmed) {
        return Err(Rejection::ForbiddenKeyword(found.as_str().to_uppercase()));
    }

    if let Some(delimiter) = COMMENT_DELIMITERS
        .iter()
        .find(|delimiter| trimmed.contains(*delimiter))
    {
        return Err(Rejection::CommentDelimiter((*delimiter).to_string()));
    }

    let statement = trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if statement.contains(';') {
        return Err(Rejection::MultipleStatements);
    }

    check_structure(statement)?;

    Ok(ValidatedQuery::new(statement.to_string()))
}

/// The leading run of word characters, or the first character if there is none.
fn first_keyword(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(offset, _)| offset);
    if end == 0 {
        let width = text.chars().next().map_or(0, char::len_utf8);
        &text[..width]
    } else {
        &text[..end]
    }
}

fn check_structure(statement: &str) -> Result<(), Rejection> {
    let statements = Parser::parse_sql(&MySqlDialect {}, statement)
        .map_err(|err| Rejection::Unparseable(err.to_string()))?;

    match statements.as_slice() {
        [Statement::Query(query)] => {
            if !query.locks.is_empty() {
                return Err(Rejection::NotAPlainRead("locking clause"));
            }
            check_body(&query.body)
        }
        [_] => Err(Rejection::NotAPlainRead("not a query")),
        [] => Err(Rejection::Empty),
        _ => Err(Rejection::MultipleStatements),
    }
}

fn check_body(body: &SetExpr) -> Result<(), Rejection> {
    match body {
        SetExpr::Select(_) => Ok(()),
        SetExpr::Query(inner) => {
            if !inner.locks.is_empty() {
                return Err(Rejection::NotAPlainRead("locking clause"));
            }
            check_body(&inner.body)
        }
        SetExpr::SetOperation { .. } => Err(Rejection::NotAPlainRead("set operation")),
        _ => Err(Rejection::NotAPlainRead("statement body is not a SELECT")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_plain_join() {
        let sql = "SELECT u.user_id, u.name, ca.company_name FROM users u \
                   JOIN company_applications ca ON u.user_id = ca.user_id \
                   WHERE ca.company_name LIKE '%삼성%' AND ca.status = 'final_accepted' LIMIT 100";
        assert_eq!(validate(sql).unwrap().as_str(), sql);
    }

    #[test]
    fn strips_trailing_semicolons_and_whitespace() {
        let validated = validate("  select name from users;  ;\n").unwrap();
        assert_eq!(validated.as_str(), "select name from users");
    }

    #[test]
    fn rejects_statements_that_are_not_reads() {
        assert_eq!(
            validate("DELETE FROM users"),
            Err(Rejection::NotARead("DELETE".to_string()))
        );
        assert_eq!(
            validate("(SELECT 1)"),
            Err(Rejection::NotARead("(".to_string()))
        );
        assert_eq!(
            validate("WITH x AS (SELECT 1) SELECT * FROM x"),
            Err(Rejection::NotARead("WITH".to_string()))
        );
        assert_eq!(validate("   "), Err(Rejection::Empty));
    }

    #[test]
    fn rejects_chained_statements() {
        assert_eq!(
            validate("SELECT * FROM t; DROP TABLE t;"),
            Err(Rejection::ForbiddenKeyword("DROP".to_string()))
        );
        assert_eq!(
            validate("SELECT * FROM users; SELECT * FROM users"),
            Err(Rejection::MultipleStatements)
        );
    }

    #[test]
    fn rejects_union_exfiltration() {
        assert_eq!(
            validate("SELECT name FROM users UNION SELECT email FROM users"),
            Err(Rejection::ForbiddenKeyword("UNION".to_string()))
        );
    }

    #[test]
    fn denylist_matches_whole_words_only() {
        assert!(validate("SELECT updated_at, created_at FROM job_reviews").is_ok());
        assert_eq!(
            validate("select name from users where 1 = sleep(5)"),
            Err(Rejection::ForbiddenKeyword("SLEEP".to_string()))
        );
    }

    #[test]
    fn rejects_comment_delimiters() {
        assert_eq!(
            validate("SELECT name FROM users -- WHERE id = 1"),
            Err(Rejection::CommentDelimiter("--".to_string()))
        );
        assert_eq!(
            validate("SELECT name /* hidden */ FROM users"),
            Err(Rejection::CommentDelimiter("/*".to_string()))
        );
    }

    #[test]
    fn rejects_locking_reads() {
        assert_eq!(
            validate("SELECT name FROM users FOR UPDATE"),
            Err(Rejection::ForbiddenKeyword("UPDATE".to_string()))
        );
    }

    #[test]
    fn rejects_text_the_parser_cannot_read() {
        assert!(matches!(
            validate("SELECT name FROM users WHERE name ="),
            Err(Rejection::Unparseable(_))
        ));
    }

    #[test]
    fn is_deterministic() {
        let candidate = "SELECT name FROM users WHERE name = 'a'";
        assert_eq!(validate(candidate), validate(candidate));
    }
}
