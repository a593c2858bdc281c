//! Removal of sensitive columns from projection lists.

use std::collections::BTreeSet;

use query_engine_metadata::metadata::{normalize_identifier, SchemaDescriptor, TableInfo};
use thiserror::Error;

use super::lexer::{self, LexError, Token, TokenKind};
use super::validation::Rejection;

/// Modifiers that may sit between `SELECT` and the first projected column.
const SELECT_MODIFIERS: &[&str] = &["DISTINCT", "DISTINCTROW", "ALL"];

/// Keywords that end the projection list.
const PROJECTION_TERMINATORS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "WINDOW", "FOR",
];

/// Keywords that end the list of sources after `FROM`.
const SOURCE_TERMINATORS: &[&str] = &["WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "WINDOW", "FOR"];

/// Words that can follow a source and are never its alias.
const NOT_AN_ALIAS: &[&str] = &[
    "ON", "USING", "JOIN", "INNER", "LEFT", "RIGHT", "CROSS", "NATURAL", "OUTER", "FULL",
    "STRAIGHT_JOIN", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "WINDOW", "FOR", "USE",
    "IGNORE", "FORCE",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedactionError {
    #[error("removing sensitive columns would leave no projected columns")]
    EmptyProjection,
    #[error("could not find the projection list")]
    NoProjection,
    #[error("could not tokenize the query: {0}")]
    Lexical(#[from] LexError),
    #[error("the rewritten query no longer validates: {0}")]
    InvalidRewrite(Rejection),
}

/// A table referenced in the `FROM` clause of one `SELECT`.
struct Source<'d> {
    /// `None` for derived tables and for tables unknown to the descriptor.
    table: Option<&'d TableInfo>,
    /// The alias if one was given, otherwise the table name.
    qualifier: Option<String>,
}

/// Remove sensitive columns from every projection list unless `allow_sensitive` is set.
///
/// Every `SELECT` is rewritten, including subqueries and derived tables, so a sensitive column
/// cannot reach the result under an alias. Items mentioning a sensitive column anywhere are
/// dropped. `*` and `alias.*` are expanded to the non-sensitive columns of the referenced tables
/// when those tables are known. The text is returned unchanged when nothing needs to be removed,
/// so redacting twice equals redacting once.
pub fn redact(
    sql: &str,
    descriptor: &SchemaDescriptor,
    allow_sensitive: bool,
) -> Result<String, RedactionError> {
    if allow_sensitive {
        return Ok(sql.to_string());
    }

    let sensitive = descriptor.sensitive_columns();
    if sensitive.is_empty() {
        return Ok(sql.to_string());
    }

    let tokens = lexer::tokenize(sql)?;
    if !tokens
        .iter()
        .any(|token| token.depth == 0 && token.is_keyword(sql, "SELECT"))
    {
        return Err(RedactionError::NoProjection);
    }

    // Outer projections go first: removing an item also removes the subqueries inside it, and
    // never moves a `SELECT` that comes before it.
    let mut rewritten = sql.to_string();
    let mut nth = 0;
    loop {
        let tokens = lexer::tokenize(&rewritten)?;
        let Some(&select) = select_keywords(&rewritten, &tokens).get(nth) else {
            break;
        };
        if let Some(next) = redact_select(&rewritten, &tokens, select, descriptor, &sensitive)? {
            rewritten = next;
        }
        nth += 1;
    }

    Ok(rewritten)
}

fn select_keywords(sql: &str, tokens: &[Token]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| token.is_keyword(sql, "SELECT"))
        .map(|(index, _)| index)
        .collect()
}

/// Rewrite the projection of the `SELECT` at token index `select`. `None` when it is unchanged.
fn redact_select(
    sql: &str,
    tokens: &[Token],
    select: usize,
    descriptor: &SchemaDescriptor,
    sensitive: &BTreeSet<String>,
) -> Result<Option<String>, RedactionError> {
    let depth = tokens[select].depth;
    let (start, end) =
        projection_bounds(sql, tokens, select).ok_or(RedactionError::NoProjection)?;
    let projection = &tokens[start..end];

    let sources = match tokens.get(end) {
        Some(token) if token.depth == depth && token.is_keyword(sql, "FROM") => {
            sources(sql, &tokens[end + 1..], depth, descriptor)
        }
        _ => vec![],
    };

    let mut changed = false;
    let mut items: Vec<String> = vec![];

    for item in lexer::split_on_commas(projection, depth) {
        let (Some(first), Some(last)) = (item.first(), item.last()) else {
            continue;
        };
        let text = &sql[first.span.start..last.span.end];

        if let Some(expanded) = expand_wildcard(sql, item, &sources) {
            changed = true;
            items.extend(expanded);
        } else if mentions_sensitive_column(sql, item, sensitive) {
            tracing::debug!(item = text, "removing sensitive projection item");
            changed = true;
        } else {
            items.push(text.to_string());
        }
    }

    if !changed {
        return Ok(None);
    }
    if items.is_empty() {
        return Err(RedactionError::EmptyProjection);
    }

    let replaced_start = projection[0].span.start;
    let replaced_end = projection[projection.len() - 1].span.end;
    Ok(Some(format!(
        "{}{}{}",
        &sql[..replaced_start],
        items.join(", "),
        &sql[replaced_end..]
    )))
}

/// Token index range `[start, end)` of the projection list of the `SELECT` at `select`.
fn projection_bounds(sql: &str, tokens: &[Token], select: usize) -> Option<(usize, usize)> {
    let depth = tokens[select].depth;
    let mut start = select + 1;
    while tokens
        .get(start)
        .is_some_and(|token| token.is_any_keyword(sql, SELECT_MODIFIERS))
    {
        start += 1;
    }
    let end = tokens
        .get(start..)?
        .iter()
        .position(|token| {
            token.depth < depth
                || (token.depth == depth
                    && (token.kind == TokenKind::Semicolon
                        || token.is_any_keyword(sql, PROJECTION_TERMINATORS)))
        })
        .map_or(tokens.len(), |offset| start + offset);

    (start < end).then_some((start, end))
}

/// Parse the sources of a `FROM` clause at `depth`, stopping at the first clause that ends it.
fn sources<'d>(
    sql: &str,
    tokens: &[Token],
    depth: usize,
    descriptor: &'d SchemaDescriptor,
) -> Vec<Source<'d>> {
    let mut sources = vec![];
    let mut expect_source = true;
    let mut index = 0;

    while let Some(token) = tokens.get(index) {
        if token.depth > depth {
            index += 1;
            continue;
        }
        if token.depth < depth
            || token.is_any_keyword(sql, SOURCE_TERMINATORS)
            || token.kind == TokenKind::Semicolon
        {
            break;
        }
        if token.kind == TokenKind::Comma || token.is_any_keyword(sql, &["JOIN", "STRAIGHT_JOIN"]) {
            expect_source = true;
            index += 1;
            continue;
        }
        if !expect_source {
            index += 1;
            continue;
        }
        expect_source = false;

        let table = if token.kind == TokenKind::LeftParen {
            // derived table: skip to the matching parenthesis
            index += 1;
            while tokens
                .get(index)
                .is_some_and(|token| !(token.depth == depth && token.kind == TokenKind::RightParen))
            {
                index += 1;
            }
            index += 1;
            None
        } else if let Some(name) = dotted_name(sql, tokens, &mut index) {
            Some(name)
        } else {
            index += 1;
            continue;
        };

        if tokens.get(index).is_some_and(|token| token.is_keyword(sql, "AS")) {
            index += 1;
        }
        let alias = tokens
            .get(index)
            .filter(|token| token.depth == depth && !token.is_any_keyword(sql, NOT_AN_ALIAS))
            .and_then(|token| token.identifier(sql));
        if alias.is_some() {
            index += 1;
        }

        let known = table
            .as_deref()
            .and_then(|name| descriptor.table(name))
            .map(|(_, info)| info);
        sources.push(Source {
            table: known,
            qualifier: alias.or(table),
        });
    }

    sources
}

/// Read `name` or `schema.name` starting at `index`, leaving `index` after it.
fn dotted_name(sql: &str, tokens: &[Token], index: &mut usize) -> Option<String> {
    let mut name = tokens.get(*index)?.identifier(sql)?;
    *index += 1;
    while tokens
        .get(*index)
        .is_some_and(|token| token.kind == TokenKind::Dot)
    {
        match tokens.get(*index + 1).and_then(|token| token.identifier(sql)) {
            Some(segment) => {
                name = segment;
                *index += 2;
            }
            None => break,
        }
    }
    Some(name)
}

/// Expand `*` or `qualifier.*` when it would otherwise return a sensitive column.
///
/// Returns `None` when the item is not a wildcard, when the wildcard only covers tables without
/// sensitive columns, or when a covered source is unknown and cannot be expanded.
fn expand_wildcard(sql: &str, item: &[Token], sources: &[Source]) -> Option<Vec<String>> {
    let covered: Vec<&Source> = match item {
        [star] if star.kind == TokenKind::Star => sources.iter().collect(),
        [qualifier, dot, star] if dot.kind == TokenKind::Dot && star.kind == TokenKind::Star => {
            let qualifier = normalize_identifier(&qualifier.identifier(sql)?);
            sources
                .iter()
                .filter(|source| {
                    source
                        .qualifier
                        .as_deref()
                        .is_some_and(|name| normalize_identifier(name) == qualifier)
                })
                .collect()
        }
        _ => return None,
    };

    if covered.is_empty() || covered.iter().any(|source| source.table.is_none()) {
        return None;
    }
    if !covered
        .iter()
        .filter_map(|source| source.table)
        .any(|table| table.columns.values().any(|column| column.sensitive))
    {
        return None;
    }

    let qualify = covered.len() > 1 || item.len() == 3;
    Some(
        covered
            .iter()
            .flat_map(|source| {
                let qualifier = source.qualifier.as_deref().unwrap_or_default();
                source
                    .table
                    .into_iter()
                    .flat_map(TableInfo::non_sensitive_columns)
                    .map(move |column| {
                        if qualify {
                            format!("{}.{}", quote_identifier(qualifier), quote_identifier(column))
                        } else {
                            quote_identifier(column)
                        }
                    })
            })
            .collect(),
    )
}

fn mentions_sensitive_column(sql: &str, item: &[Token], sensitive: &BTreeSet<String>) -> bool {
    item.iter()
        .filter_map(|token| token.identifier(sql))
        .any(|identifier| sensitive.contains(&normalize_identifier(&identifier)))
}

/// Backtick-quote an identifier unless it is a plain word.
fn quote_identifier(identifier: &str) -> String {
    let plain = identifier
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        identifier.to_string()
    } else {
        format!("`{}`", identifier.replace('`', "``"))
    }
}
