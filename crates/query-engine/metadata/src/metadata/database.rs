//! Metadata information regarding the tables and columns of the store.

use std::collections::BTreeMap;
use std::fmt;

use enum_iterator::Sequence;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::normalize_identifier;

/// The scalar types a column of the store may have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Integer,
    Bigint,
    Float,
    Decimal,
    Varchar,
    Text,
    Enum,
    Date,
    Datetime,
    Timestamp,
    Json,
}

impl ScalarType {
    /// The type name as it appears in the store's DDL.
    pub fn sql_name(self) -> &'static str {
        match self {
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Integer => "INT",
            ScalarType::Bigint => "BIGINT",
            ScalarType::Float => "FLOAT",
            ScalarType::Decimal => "DECIMAL",
            ScalarType::Varchar => "VARCHAR",
            ScalarType::Text => "TEXT",
            ScalarType::Enum => "ENUM",
            ScalarType::Date => "DATE",
            ScalarType::Datetime => "DATETIME",
            ScalarType::Timestamp => "TIMESTAMP",
            ScalarType::Json => "JSON",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Mapping from a table name to its information, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TablesInfo(pub IndexMap<String, TableInfo>);

impl TablesInfo {
    pub fn empty() -> Self {
        TablesInfo(IndexMap::new())
    }
}

/// Information about a table of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub description: Option<String>,
    pub columns: IndexMap<String, ColumnInfo>,
    #[serde(default)]
    pub foreign_relations: ForeignRelations,
}

impl TableInfo {
    /// Look up a column by name, ignoring case and quoting.
    pub fn column(&self, name: &str) -> Option<(&str, &ColumnInfo)> {
        let wanted = normalize_identifier(name);
        self.columns
            .iter()
            .find(|(column_name, _)| normalize_identifier(column_name) == wanted)
            .map(|(column_name, info)| (column_name.as_str(), info))
    }

    /// The columns that may be returned to callers without sensitive-data access.
    pub fn non_sensitive_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, column)| !column.sensitive)
            .map(|(name, _)| name.as_str())
    }
}

/// Can this column contain null values
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Nullable {
    #[default]
    Nullable,
    NonNullable,
}

/// Information about a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub r#type: ScalarType,
    /// Maximum length for character types.
    pub length: Option<u32>,
    #[serde(default)]
    pub nullable: Nullable,
    pub description: Option<String>,
    /// Personally identifying contact information, e.g. email or phone.
    #[serde(default)]
    pub sensitive: bool,
    /// Enumerated values the column can hold, with their business meaning.
    #[serde(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, String>,
}

impl ColumnInfo {
    pub fn new(r#type: ScalarType) -> Self {
        ColumnInfo {
            r#type,
            length: None,
            nullable: Nullable::default(),
            description: None,
            sensitive: false,
            values: IndexMap::new(),
        }
    }
}

/// A mapping from the name of a foreign key constraint to its value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ForeignRelations(pub BTreeMap<String, ForeignRelation>);

/// A foreign key constraint, used to tell the model how tables join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForeignRelation {
    pub foreign_table: String,
    pub column_mapping: BTreeMap<String, String>,
}
