//! Extracting a candidate query from the model's reply.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Used when the model answered with bare SQL instead of the requested JSON.
pub const FALLBACK_DESCRIPTION: &str = "Automatically generated query";

/// A `SELECT` up to and including the first semicolon.
static BARE_SELECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bSELECT\b.*?;").expect("bare select pattern is valid"));

/// The query and description the model proposed. Nothing here is trusted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub candidate_query: String,
    pub description: String,
}

#[derive(Deserialize)]
struct JsonReply {
    #[serde(default)]
    sql: String,
    #[serde(default)]
    description: String,
}

/// Find the candidate query in a reply.
///
/// The reply should be a JSON object `{"sql": ..., "description": ...}`, possibly wrapped in
/// prose or a code fence. If no such object can be read, a bare `SELECT ...;` is accepted.
pub fn parse_reply(reply: &str) -> Option<Translation> {
    parse_json_reply(reply).or_else(|| parse_bare_select(reply))
}

fn parse_json_reply(reply: &str) -> Option<Translation> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: JsonReply = serde_json::from_str(&reply[start..=end]).ok()?;
    let candidate_query = parsed.sql.trim().to_string();
    if candidate_query.is_empty() {
        return None;
    }
    Some(Translation {
        candidate_query,
        description: parsed.description.trim().to_string(),
    })
}

fn parse_bare_select(reply: &str) -> Option<Translation> {
    let found = BARE_SELECT.find(reply)?;
    Some(Translation {
        candidate_query: found.as_str().trim().to_string(),
        description: FALLBACK_DESCRIPTION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_json_reply() {
        let reply = r#"{"sql": "SELECT name FROM users LIMIT 100", "description": "All names"}"#;
        assert_eq!(
            parse_reply(reply),
            Some(Translation {
                candidate_query: "SELECT name FROM users LIMIT 100".to_string(),
                description: "All names".to_string(),
            })
        );
    }

    #[test]
    fn reads_json_wrapped_in_a_code_fence() {
        let reply = "Here you go:\n```json\n{\n  \"sql\": \"SELECT name FROM users\",\n  \"description\": \"names\"\n}\n```";
        let translation = parse_reply(reply).unwrap();
        assert_eq!(translation.candidate_query, "SELECT name FROM users");
        assert_eq!(translation.description, "names");
    }

    #[test]
    fn falls_back_to_a_bare_select() {
        let reply = "The query is:\nselect name\nfrom users;\nHope this helps.";
        assert_eq!(
            parse_reply(reply),
            Some(Translation {
                candidate_query: "select name\nfrom users;".to_string(),
                description: FALLBACK_DESCRIPTION.to_string(),
            })
        );
    }

    #[test]
    fn an_empty_sql_field_is_not_a_query() {
        assert_eq!(parse_reply(r#"{"sql": "  ", "description": "nothing"}"#), None);
    }

    #[test]
    fn replies_without_a_query_are_refused() {
        assert_eq!(parse_reply("I cannot help with that."), None);
        assert_eq!(parse_reply("SELECT name FROM users"), None);
    }

    #[test]
    fn the_query_is_passed_through_untouched() {
        // whatever the model says is validated later, not here
        let reply = r#"{"sql": "SELECT * FROM users; DELETE FROM users;", "description": "x"}"#;
        assert_eq!(
            parse_reply(reply).unwrap().candidate_query,
            "SELECT * FROM users; DELETE FROM users;"
        );
    }
}
