//! A small quote and parenthesis aware lexer for MySQL-flavoured SQL.
//!
//! This does not try to understand the grammar. It only needs to tell identifiers apart from
//! literals, and to know how deeply nested in parentheses each token sits, so that the
//! rewriting passes can find top-level clauses without being fooled by subqueries or by
//! keywords inside string literals.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An unquoted identifier or keyword.
    Word,
    /// A backtick-quoted identifier.
    QuotedIdentifier,
    /// A single or double quoted string.
    StringLiteral,
    Number,
    Comma,
    Semicolon,
    Dot,
    Star,
    LeftParen,
    RightParen,
    /// Any other run of punctuation, e.g. `=`, `<>`, `>=`.
    Operator,
    /// `-- ...`, `# ...` or `/* ... */`.
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source text.
    pub span: Range<usize>,
    /// Parenthesis nesting depth. Parentheses themselves carry the depth outside of them.
    pub depth: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    /// Is this an unquoted word equal to the given keyword, ignoring case?
    pub fn is_keyword(&self, source: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(keyword)
    }

    /// Is this an unquoted word equal to any of the given keywords, ignoring case?
    pub fn is_any_keyword(&self, source: &str, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .any(|keyword| self.is_keyword(source, keyword))
    }

    /// The identifier this token names, without quoting. `None` for non-identifiers.
    pub fn identifier(&self, source: &str) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text(source).to_string()),
            TokenKind::QuotedIdentifier => {
                let text = self.text(source);
                Some(text[1..text.len() - 1].replace("``", "`"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unterminated quoted identifier starting at byte {0}")]
    UnterminatedIdentifier(usize),
    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),
    #[error("unbalanced parentheses at byte {0}")]
    UnbalancedParentheses(usize),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Split SQL text into tokens, skipping whitespace.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut depth: usize = 0;

    while let Some((start, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '\'' | '"' => {
                let quote = c;
                let mut terminated = false;
                while let Some((_, next)) = chars.next() {
                    if next == '\\' {
                        chars.next();
                    } else if next == quote {
                        // a doubled quote is an escaped quote
                        if matches!(chars.peek(), Some((_, following)) if *following == quote) {
                            chars.next();
                        } else {
                            terminated = true;
                            break;
                        }
                    }
                }
                if !terminated {
                    return Err(LexError::UnterminatedString(start));
                }
                TokenKind::StringLiteral
            }
            '`' => {
                let mut terminated = false;
                while let Some((_, next)) = chars.next() {
                    if next == '`' {
                        if matches!(chars.peek(), Some((_, '`'))) {
                            chars.next();
                        } else {
                            terminated = true;
                            break;
                        }
                    }
                }
                if !terminated {
                    return Err(LexError::UnterminatedIdentifier(start));
                }
                TokenKind::QuotedIdentifier
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                skip_line(&mut chars);
                TokenKind::Comment
            }
            '#' => {
                skip_line(&mut chars);
                TokenKind::Comment
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut terminated = false;
                while let Some((_, next)) = chars.next() {
                    if next == '*' && matches!(chars.peek(), Some((_, '/'))) {
                        chars.next();
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Err(LexError::UnterminatedComment(start));
                }
                TokenKind::Comment
            }
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::LeftParen,
                    span: start..start + 1,
                    depth,
                });
                depth += 1;
                continue;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(LexError::UnbalancedParentheses(start))?;
                TokenKind::RightParen
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '*' => TokenKind::Star,
            c if c.is_ascii_digit() => {
                while matches!(chars.peek(), Some((_, next)) if next.is_ascii_alphanumeric() || *next == '.')
                {
                    chars.next();
                }
                TokenKind::Number
            }
            c if is_word_char(c) => {
                while matches!(chars.peek(), Some((_, next)) if is_word_char(*next)) {
                    chars.next();
                }
                TokenKind::Word
            }
            _ => {
                while matches!(chars.peek(), Some((_, next)) if is_operator_char(*next)) {
                    chars.next();
                }
                TokenKind::Operator
            }
        };

        let end = chars.peek().map_or(source.len(), |(offset, _)| *offset);
        tokens.push(Token {
            kind,
            span: start..end,
            depth,
        });
    }

    if depth != 0 {
        return Err(LexError::UnbalancedParentheses(source.len()));
    }

    Ok(tokens)
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '<' | '>' | '!' | '+' | '|' | '&' | '^' | '~' | '%' | ':' | '@' | '?'
    )
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::CharIndices>) {
    while let Some((_, next)) = chars.peek() {
        if *next == '\n' {
            break;
        }
        chars.next();
    }
}

/// Split a token slice on top-level commas, relative to the depth of the first token.
pub fn split_on_commas(tokens: &[Token], depth: usize) -> Vec<&[Token]> {
    if tokens.is_empty() {
        return vec![];
    }
    tokens
        .split(|token| token.kind == TokenKind::Comma && token.depth == depth)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String, usize)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| (token.kind, token.text(source).to_string(), token.depth))
            .collect()
    }

    #[test]
    fn tracks_parenthesis_depth() {
        let tokens = kinds("SELECT COUNT(*) FROM t");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Word, "SELECT".to_string(), 0),
                (TokenKind::Word, "COUNT".to_string(), 0),
                (TokenKind::LeftParen, "(".to_string(), 0),
                (TokenKind::Star, "*".to_string(), 1),
                (TokenKind::RightParen, ")".to_string(), 0),
                (TokenKind::Word, "FROM".to_string(), 0),
                (TokenKind::Word, "t".to_string(), 0),
            ]
        );
    }

    #[test]
    fn keywords_inside_literals_are_not_words() {
        let source = "SELECT name FROM t WHERE note = 'FROM here; it''s \\' fine'";
        let tokens = tokenize(source).unwrap();
        let words: Vec<&str> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Word)
            .map(|token| token.text(source))
            .collect();
        assert_eq!(words, vec!["SELECT", "name", "FROM", "t", "WHERE", "note"]);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::StringLiteral);
    }

    #[test]
    fn non_ascii_literals_keep_byte_spans() {
        let source = "SELECT a FROM t WHERE c LIKE '%삼성%' LIMIT 5";
        let tokens = tokenize(source).unwrap();
        let literal = tokens
            .iter()
            .find(|token| token.kind == TokenKind::StringLiteral)
            .unwrap();
        assert_eq!(literal.text(source), "'%삼성%'");
        assert_eq!(tokens.last().unwrap().text(source), "5");
    }

    #[test]
    fn quoted_identifiers_are_unquoted() {
        let source = "SELECT `user id` FROM t";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdentifier);
        assert_eq!(tokens[1].identifier(source), Some("user id".to_string()));
    }

    #[test]
    fn comments_are_single_tokens() {
        let tokens = kinds("SELECT 1 -- trailing\n/* block */ # hash");
        let comments: Vec<String> = tokens
            .into_iter()
            .filter(|(kind, _, _)| *kind == TokenKind::Comment)
            .map(|(_, text, _)| text)
            .collect();
        assert_eq!(comments, vec!["-- trailing", "/* block */", "# hash"]);
    }

    #[test]
    fn unterminated_input_is_an_error() {
        assert_eq!(
            tokenize("SELECT 'abc"),
            Err(LexError::UnterminatedString(7))
        );
        assert_eq!(
            tokenize("SELECT (1"),
            Err(LexError::UnbalancedParentheses(9))
        );
        assert_eq!(
            tokenize("SELECT 1)"),
            Err(LexError::UnbalancedParentheses(8))
        );
    }

    #[test]
    fn splits_only_on_top_level_commas() {
        let source = "a, CONCAT(b, c), d";
        let tokens = tokenize(source).unwrap();
        let items: Vec<String> = split_on_commas(&tokens, 0)
            .into_iter()
            .map(|item| {
                source[item.first().unwrap().span.start..item.last().unwrap().span.end].to_string()
            })
            .collect();
        assert_eq!(items, vec!["a", "CONCAT(b, c)", "d"]);
    }
}
