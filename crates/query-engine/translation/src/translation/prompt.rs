//! Building the prompt sent to the language model.

use std::fmt::Write;

use query_engine_metadata::metadata::{
    ColumnInfo, Nullable, ScalarType, SchemaDescriptor, TableInfo,
};

/// Constraints the model is told to respect. None of them is trusted: the validator, the
/// rewriter and the limiter enforce them again on whatever comes back.
const CONSTRAINTS: &[&str] = &[
    "Produce exactly one SELECT statement. Never produce INSERT, UPDATE, DELETE or any other statement that changes data or schema.",
    "Always end the query with a LIMIT clause.",
    "Project plain columns. Do not use JSON_OBJECT, GROUP_CONCAT or other functions that build nested or structured values.",
    "Use the English column names from the schema.",
    "Leave out contact details (the columns marked SENSITIVE) unless the question explicitly asks for them.",
    "Do not use comments, UNION, subqueries in the FROM clause, or more than one statement.",
];

const REPLY_FORMAT: &str = r#"Reply with a single JSON object and nothing else:
{"sql": "<the SQL query>", "description": "<one sentence describing what the query returns>"}"#;

const EXAMPLE_REPLY: &str = r#"{"sql": "SELECT u.user_id, u.name, ca.company_name, ca.position, ca.status FROM users u JOIN company_applications ca ON u.user_id = ca.user_id WHERE ca.company_name LIKE '%삼성%' AND ca.status = 'final_accepted' LIMIT 100", "description": "Students who were finally accepted at Samsung"}"#;

/// The full prompt for one question.
pub fn build_prompt(question: &str, schema: &SchemaDescriptor) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a database expert. Translate the question below into a MySQL query over this schema.\n\n",
    );

    prompt.push_str("Schema:\n");
    prompt.push_str(&render_schema(schema));
    prompt.push('\n');

    let vocabulary = render_vocabulary(schema);
    if !vocabulary.is_empty() {
        prompt.push_str("Vocabulary:\n");
        prompt.push_str(&vocabulary);
        prompt.push('\n');
    }

    prompt.push_str("Requirements:\n");
    for (index, constraint) in CONSTRAINTS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {constraint}", index + 1);
    }
    prompt.push('\n');

    prompt.push_str(REPLY_FORMAT);
    prompt.push_str("\n\nExample reply:\n");
    prompt.push_str(EXAMPLE_REPLY);
    prompt.push_str("\n\n");

    // the question goes last, quoted as data
    let _ = writeln!(
        prompt,
        "Question: {}",
        serde_json::Value::String(question.trim().to_string())
    );
    prompt.push_str("\nReply:\n");

    prompt
}

/// The tables of the descriptor as DDL, with enumerated values and relations as comments.
pub fn render_schema(schema: &SchemaDescriptor) -> String {
    let mut out = String::new();
    for (table_name, table) in &schema.tables.0 {
        render_table(&mut out, table_name, table);
        out.push('\n');
    }
    out
}

fn render_table(out: &mut String, table_name: &str, table: &TableInfo) {
    if let Some(description) = &table.description {
        let _ = writeln!(out, "-- {description}");
    }
    let _ = writeln!(out, "CREATE TABLE {table_name} (");

    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|(name, column)| render_column(name, column))
        .collect();
    out.push_str(&columns.join(",\n"));
    out.push_str("\n);\n");

    for relation in table.foreign_relations.0.values() {
        let joins: Vec<String> = relation
            .column_mapping
            .iter()
            .map(|(local, foreign)| {
                format!("{table_name}.{local} = {}.{foreign}", relation.foreign_table)
            })
            .collect();
        let _ = writeln!(out, "-- joins: {}", joins.join(" AND "));
    }

    for (name, column) in &table.columns {
        for (value, meaning) in &column.values {
            let _ = writeln!(out, "-- {table_name}.{name} = '{value}': {meaning}");
        }
    }
}

fn render_column(name: &str, column: &ColumnInfo) -> String {
    let mut line = format!("    {name} ");
    match (column.r#type, column.length) {
        (ScalarType::Enum, _) if !column.values.is_empty() => {
            let values: Vec<String> = column
                .values
                .keys()
                .map(|value| format!("'{value}'"))
                .collect();
            let _ = write!(line, "ENUM({})", values.join(","));
        }
        (scalar, Some(length)) => {
            let _ = write!(line, "{scalar}({length})");
        }
        (scalar, None) => {
            let _ = write!(line, "{scalar}");
        }
    }
    if column.nullable == Nullable::NonNullable {
        line.push_str(" NOT NULL");
    }
    match (&column.description, column.sensitive) {
        (Some(description), true) => {
            let _ = write!(line, " -- SENSITIVE: {description}");
        }
        (None, true) => line.push_str(" -- SENSITIVE"),
        (Some(description), false) => {
            let _ = write!(line, " -- {description}");
        }
        (None, false) => {}
    }
    line
}

/// Glossary terms, company aliases and free-form guidance.
fn render_vocabulary(schema: &SchemaDescriptor) -> String {
    let glossary = &schema.glossary;
    let mut out = String::new();

    for term in &glossary.terms {
        let _ = writeln!(
            out,
            "- \"{}\" means {} = '{}'",
            term.phrase, term.column, term.value
        );
    }
    for (alias, company) in &glossary.company_aliases {
        let _ = writeln!(out, "- the company \"{alias}\" is stored as '{company}'");
    }
    for guidance in &glossary.guidance {
        let _ = writeln!(out, "- {guidance}");
    }

    out
}
