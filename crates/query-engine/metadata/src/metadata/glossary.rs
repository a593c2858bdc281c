//! Business vocabulary that maps how staff phrase questions to literal values in the store.

use std::fmt;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Glossary embedded into every translation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Glossary {
    /// Phrases that denote a specific column value, e.g. "finally accepted".
    #[serde(default)]
    pub terms: Vec<GlossaryTerm>,
    /// Colloquial company names mapped to the name stored in the data.
    #[serde(default)]
    pub company_aliases: IndexMap<String, String>,
    /// Free-form rules for the model, e.g. which table is authoritative for outcomes.
    #[serde(default)]
    pub guidance: Vec<String>,
}

/// A phrase that means `column = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GlossaryTerm {
    pub phrase: String,
    pub column: ColumnReference,
    pub value: String,
}

/// A fully qualified column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}
