//! Configuration for the gateway.

use std::time::Duration;

use query_engine_metadata::metadata::SchemaDescriptor;
use schemars::schema::RootSchema;

use crate::values::PoolSettings;
use crate::version1::ParsedConfiguration;

/// The 'Configuration' type collects all the information necessary to serve questions at
/// runtime.
///
/// Values of this type are produced from a 'ParsedConfiguration' using
/// 'make_runtime_configuration', once every secret has been resolved and the schema descriptor
/// has been checked.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub schema: SchemaDescriptor,
    pub connection_uri: String,
    pub pool_settings: PoolSettings,
    pub language_model: LanguageModelConfiguration,
    pub execution_timeout: Duration,
}

/// How to reach the language model.
#[derive(Clone)]
pub struct LanguageModelConfiguration {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LanguageModelConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModelConfiguration")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The JSON schema of `configuration.json`.
pub fn generate_latest_schema() -> RootSchema {
    schemars::schema_for!(ParsedConfiguration)
}
