//! Row bounding.
//!
//! Every query that reaches the store carries exactly one top-level `LIMIT` clause whose row
//! count does not exceed the caller's (clamped) limit.

use super::lexer::{self, LexError, Token, TokenKind};

pub const MIN_ROW_LIMIT: u32 = 1;
pub const MAX_ROW_LIMIT: u32 = 1000;

const ROW_BOUND_KEYWORD: &str = "LIMIT";

/// Clamp a requested row limit into `MIN_ROW_LIMIT..=MAX_ROW_LIMIT`.
pub fn clamp_limit(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MIN_ROW_LIMIT), i64::from(MAX_ROW_LIMIT));
    u32::try_from(clamped).unwrap_or(MAX_ROW_LIMIT)
}

/// The number of top-level row bound clauses in the statement.
pub fn count_row_bounds(sql: &str) -> Result<usize, LexError> {
    let tokens = lexer::tokenize(sql)?;
    Ok(top_level_limits(sql, &tokens).count())
}

/// Ensure the statement carries a row bound no larger than the clamped `requested_limit`.
///
/// An existing bound that is already small enough is left untouched, since the model may
/// have chosen it on purpose. A larger one is lowered. A missing one is appended.
/// Applying this twice gives the same text as applying it once.
pub fn bound(sql: &str, requested_limit: i64) -> Result<String, LexError> {
    let limit = clamp_limit(requested_limit);
    let statement = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    let tokens = lexer::tokenize(statement)?;

    let Some(position) = top_level_limits(statement, &tokens)
        .map(|(position, _)| position)
        .next()
    else {
        return Ok(format!("{statement} {ROW_BOUND_KEYWORD} {limit}"));
    };

    let Some(row_count) = row_count_token(&tokens[position + 1..]) else {
        // a bound we cannot read, e.g. a placeholder: replace the whole clause argument
        let clause_end = tokens
            .get(position + 1)
            .map_or(tokens[position].span.end, |token| token.span.end);
        return Ok(format!(
            "{} {limit}{}",
            &statement[..tokens[position].span.end],
            &statement[clause_end..]
        ));
    };

    match row_count.text(statement).parse::<u64>() {
        Ok(existing) if existing <= u64::from(limit) => Ok(statement.to_string()),
        _ => {
            tracing::debug!(
                existing = row_count.text(statement),
                limit,
                "lowering row bound"
            );
            Ok(format!(
                "{}{limit}{}",
                &statement[..row_count.span.start],
                &statement[row_count.span.end..]
            ))
        }
    }
}

fn top_level_limits<'a>(
    sql: &'a str,
    tokens: &'a [Token],
) -> impl Iterator<Item = (usize, &'a Token)> + 'a {
    tokens
        .iter()
        .enumerate()
        .filter(move |(_, token)| token.depth == 0 && token.is_keyword(sql, ROW_BOUND_KEYWORD))
}

/// `LIMIT n`, `LIMIT n OFFSET m` and `LIMIT m, n` all bound the row count with `n`.
fn row_count_token(after_limit: &[Token]) -> Option<&Token> {
    match after_limit {
        [offset, comma, count, ..]
            if offset.kind == TokenKind::Number
                && comma.kind == TokenKind::Comma
                && count.kind == TokenKind::Number =>
        {
            Some(count)
        }
        [count, ..] if count.kind == TokenKind::Number => Some(count),
        _ => None,
    }
}
