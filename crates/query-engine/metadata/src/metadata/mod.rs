//! Metadata information regarding the analytical store and its business vocabulary.

pub mod database;
pub mod glossary;

// re-export without modules
pub use database::*;
pub use glossary::*;

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The versioned description of the store's queryable shape.
///
/// This is loaded once at startup and shared read-only between requests.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    /// Version of the contract with the external store.
    #[serde(default = "default_descriptor_version")]
    pub version: u32,
    pub tables: TablesInfo,
    #[serde(default)]
    pub glossary: Glossary,
}

fn default_descriptor_version() -> u32 {
    1
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl SchemaDescriptor {
    pub fn empty() -> Self {
        SchemaDescriptor {
            version: default_descriptor_version(),
            tables: TablesInfo::empty(),
            glossary: Glossary::default(),
        }
    }

    /// Look up a table by name, ignoring case and surrounding backticks.
    pub fn table(&self, name: &str) -> Option<(&str, &TableInfo)> {
        let wanted = normalize_identifier(name);
        self.tables
            .0
            .iter()
            .find(|(table_name, _)| normalize_identifier(table_name) == wanted)
            .map(|(table_name, info)| (table_name.as_str(), info))
    }

    /// The lowercased names of every column tagged as sensitive, across all tables.
    pub fn sensitive_columns(&self) -> BTreeSet<String> {
        self.tables
            .0
            .values()
            .flat_map(|table| table.columns.iter())
            .filter(|(_, column)| column.sensitive)
            .map(|(name, _)| normalize_identifier(name))
            .collect()
    }

    /// Is this field name one of the sensitive columns?
    pub fn is_sensitive(&self, field_name: &str) -> bool {
        let wanted = normalize_identifier(field_name);
        self.tables.0.values().any(|table| {
            table
                .columns
                .iter()
                .any(|(name, column)| column.sensitive && normalize_identifier(name) == wanted)
        })
    }

    /// Check that the descriptor is internally consistent.
    ///
    /// Every glossary term and foreign relation must point at a declared column, and a term
    /// pointing at an enumerated column must use one of its declared values.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.tables.0.is_empty() {
            return Err(SchemaError::NoTables);
        }

        for (table_name, table) in &self.tables.0 {
            if table.columns.is_empty() {
                return Err(SchemaError::NoColumns(table_name.clone()));
            }
            for (relation_name, relation) in &table.foreign_relations.0 {
                let (_, foreign_table) = self.table(&relation.foreign_table).ok_or_else(|| {
                    SchemaError::UnknownTable {
                        referenced_by: format!("{table_name}.{relation_name}"),
                        table: relation.foreign_table.clone(),
                    }
                })?;
                for (local, foreign) in &relation.column_mapping {
                    if table.column(local).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            referenced_by: format!("{table_name}.{relation_name}"),
                            column: format!("{table_name}.{local}"),
                        });
                    }
                    if foreign_table.column(foreign).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            referenced_by: format!("{table_name}.{relation_name}"),
                            column: format!("{}.{foreign}", relation.foreign_table),
                        });
                    }
                }
            }
        }

        for term in &self.glossary.terms {
            let (_, table) =
                self.table(&term.column.table)
                    .ok_or_else(|| SchemaError::UnknownTable {
                        referenced_by: format!("glossary term '{}'", term.phrase),
                        table: term.column.table.clone(),
                    })?;
            let (_, column) =
                table
                    .column(&term.column.column)
                    .ok_or_else(|| SchemaError::UnknownColumn {
                        referenced_by: format!("glossary term '{}'", term.phrase),
                        column: term.column.to_string(),
                    })?;
            if !column.values.is_empty() && !column.values.contains_key(&term.value) {
                return Err(SchemaError::UnknownValue {
                    phrase: term.phrase.clone(),
                    column: term.column.to_string(),
                    value: term.value.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Lowercase an identifier and strip any quoting.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier
        .trim()
        .trim_matches(|c| c == '`' || c == '"')
        .to_lowercase()
}

/// Inconsistencies found in a schema descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("the schema descriptor declares no tables")]
    NoTables,
    #[error("table '{0}' declares no columns")]
    NoColumns(String),
    #[error("{referenced_by} refers to unknown table '{table}'")]
    UnknownTable {
        referenced_by: String,
        table: String,
    },
    #[error("{referenced_by} refers to unknown column '{column}'")]
    UnknownColumn {
        referenced_by: String,
        column: String,
    },
    #[error("glossary term '{phrase}' maps to '{value}', which is not a declared value of {column}")]
    UnknownValue {
        phrase: String,
        column: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn users_table() -> TableInfo {
        TableInfo {
            description: None,
            columns: IndexMap::from([
                ("user_id".to_string(), ColumnInfo::new(ScalarType::Varchar)),
                ("name".to_string(), ColumnInfo::new(ScalarType::Varchar)),
                (
                    "email".to_string(),
                    ColumnInfo {
                        sensitive: true,
                        ..ColumnInfo::new(ScalarType::Varchar)
                    },
                ),
            ]),
            foreign_relations: ForeignRelations::default(),
        }
    }

    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            tables: TablesInfo(IndexMap::from([("users".to_string(), users_table())])),
            ..SchemaDescriptor::empty()
        }
    }

    #[test]
    fn sensitive_columns_are_collected_lowercased() {
        let descriptor = descriptor();
        assert_eq!(
            descriptor.sensitive_columns(),
            BTreeSet::from(["email".to_string()])
        );
        assert!(descriptor.is_sensitive("EMAIL"));
        assert!(descriptor.is_sensitive("`email`"));
        assert!(!descriptor.is_sensitive("name"));
    }

    #[test]
    fn table_lookup_ignores_case() {
        let descriptor = descriptor();
        assert_eq!(descriptor.table("Users").map(|(name, _)| name), Some("users"));
        assert!(descriptor.table("applications").is_none());
    }

    #[test]
    fn glossary_terms_must_point_at_declared_columns() {
        let mut descriptor = descriptor();
        descriptor.glossary.terms.push(GlossaryTerm {
            phrase: "hired".to_string(),
            column: ColumnReference {
                table: "users".to_string(),
                column: "status".to_string(),
            },
            value: "final_accepted".to_string(),
        });
        assert!(matches!(
            descriptor.validate(),
            Err(SchemaError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn default_descriptor_matches_a_deserialized_empty_one() {
        let parsed: SchemaDescriptor = serde_json::from_value(serde_json::json!({ "tables": {} }))
            .expect("descriptor");
        assert_eq!(SchemaDescriptor::default(), parsed);
        assert_eq!(SchemaDescriptor::default().version, 1);
    }

    #[test]
    fn empty_descriptor_is_rejected() {
        assert_eq!(SchemaDescriptor::empty().validate(), Err(SchemaError::NoTables));
    }
}
