//! The on-disk configuration format, version 1.

use std::path::Path;

use query_engine_metadata::metadata::SchemaDescriptor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};
use crate::values::{ConnectionUri, PoolSettings, Secret};

const CURRENT_VERSION: u32 = 1;
pub const CONFIGURATION_FILENAME: &str = "configuration.json";
pub const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";
pub const DEFAULT_CONNECTION_URI_VARIABLE: &str = "STAFF_SEARCH_DATABASE_URL";
pub const DEFAULT_API_KEY_VARIABLE: &str = "GEMINI_API_KEY";

/// The configuration as written in `configuration.json`. Secrets may still point at
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfiguration {
    /// Which version of the configuration format are we using
    pub version: u32,
    /// Connection string for the analytical MySQL store
    #[serde(default = "connection_uri_default")]
    pub connection_uri: ConnectionUri,
    #[serde(default)]
    pub language_model: LanguageModelSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(skip_serializing_if = "PoolSettings::is_default")]
    #[serde(default)]
    pub pool_settings: PoolSettings,
    /// Tables, columns and business vocabulary the language model may use
    #[serde(default)]
    pub schema: SchemaDescriptor,
}

impl ParsedConfiguration {
    pub fn initial() -> Self {
        ParsedConfiguration {
            version: CURRENT_VERSION,
            connection_uri: connection_uri_default(),
            language_model: LanguageModelSettings::default(),
            execution: ExecutionSettings::default(),
            pool_settings: PoolSettings::default(),
            schema: SchemaDescriptor::empty(),
        }
    }
}

/// Settings for the hosted language model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LanguageModelSettings {
    #[serde(default = "api_key_default")]
    pub api_key: Secret,
    #[serde(default = "model_default")]
    pub model: String,
    #[serde(default = "endpoint_default")]
    pub endpoint: String,
    /// Upper bound on a single translation (seconds)
    #[serde(default = "timeout_seconds_default")]
    pub timeout_seconds: u64,
}

impl Default for LanguageModelSettings {
    fn default() -> Self {
        LanguageModelSettings {
            api_key: api_key_default(),
            model: model_default(),
            endpoint: endpoint_default(),
            timeout_seconds: timeout_seconds_default(),
        }
    }
}

/// Settings for running queries against the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Upper bound on acquiring a connection and draining the result (seconds)
    #[serde(default = "timeout_seconds_default")]
    pub timeout_seconds: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            timeout_seconds: timeout_seconds_default(),
        }
    }
}

// for serde default //
fn connection_uri_default() -> ConnectionUri {
    ConnectionUri(Secret::from_environment(DEFAULT_CONNECTION_URI_VARIABLE))
}
fn api_key_default() -> Secret {
    Secret::from_environment(DEFAULT_API_KEY_VARIABLE)
}
fn model_default() -> String {
    "gemini-1.5-flash".to_string()
}
fn endpoint_default() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn timeout_seconds_default() -> u64 {
    30
}

/// Read `configuration.json` from a directory.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents =
        fs::read_to_string(&configuration_file)
            .await
            .map_err(|err| {
                ParseConfigurationError::IoErrorButStringified(format!(
                    "{}: {}",
                    &configuration_file.display(),
                    err
                ))
            })?;

    let parsed_config: ParsedConfiguration = serde_json::from_str(&configuration_file_contents)
        .map_err(|error| ParseConfigurationError::ParseError {
            file_path: configuration_file.clone(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        })?;

    if parsed_config.version != CURRENT_VERSION {
        return Err(ParseConfigurationError::UnsupportedVersion(
            parsed_config.version,
        ));
    }

    tracing::debug!(
        tables = parsed_config.schema.tables.0.len(),
        glossary_terms = parsed_config.schema.glossary.terms.len(),
        "parsed configuration"
    );

    Ok(parsed_config)
}

/// Write the parsed configuration, and the JSON schema describing it, into a directory on disk.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let configuration_file = out_dir.as_ref().to_owned().join(CONFIGURATION_FILENAME);
    fs::create_dir_all(out_dir.as_ref()).await?;

    fs::write(
        configuration_file,
        serde_json::to_string_pretty(&parsed_config)
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    let configuration_jsonschema_file_path = out_dir
        .as_ref()
        .to_owned()
        .join(CONFIGURATION_JSONSCHEMA_FILENAME);

    let output = crate::configuration::generate_latest_schema();
    fs::write(
        &configuration_jsonschema_file_path,
        serde_json::to_string_pretty(&output)
            .map_err(|e| WriteParsedConfigurationError::IoError(e.into()))?
            + "\n",
    )
    .await?;

    Ok(())
}
