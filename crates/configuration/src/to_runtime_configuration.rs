//! Convert a parsed configuration into the runtime one, resolving secrets along the way.

use std::time::Duration;

use crate::configuration::{Configuration, LanguageModelConfiguration};
use crate::environment::Environment;
use crate::error::MakeRuntimeConfigurationError;
use crate::values::{ConnectionUri, Secret};
use crate::version1::ParsedConfiguration;

/// Convert the parsed configuration into the runtime configuration. Fails when a secret
/// cannot be resolved, the schema descriptor is inconsistent, or a setting is out of range.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    environment: impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let ConnectionUri(connection_uri) = &parsed_config.connection_uri;
    let connection_uri = resolve_secret(connection_uri, &environment)?;
    let api_key = resolve_secret(&parsed_config.language_model.api_key, &environment)?;

    parsed_config.schema.validate()?;

    let model_timeout = positive_seconds(
        "languageModel.timeoutSeconds",
        parsed_config.language_model.timeout_seconds,
    )?;
    let execution_timeout = positive_seconds(
        "execution.timeoutSeconds",
        parsed_config.execution.timeout_seconds,
    )?;
    if parsed_config.pool_settings.max_connections == 0 {
        return Err(MakeRuntimeConfigurationError::InvalidSetting {
            setting: "poolSettings.maxConnections",
            message: "must be at least 1".to_string(),
        });
    }
    if parsed_config.language_model.model.trim().is_empty() {
        return Err(MakeRuntimeConfigurationError::InvalidSetting {
            setting: "languageModel.model",
            message: "must not be empty".to_string(),
        });
    }

    Ok(Configuration {
        schema: parsed_config.schema,
        connection_uri,
        pool_settings: parsed_config.pool_settings,
        language_model: LanguageModelConfiguration {
            api_key,
            model: parsed_config.language_model.model,
            endpoint: parsed_config
                .language_model
                .endpoint
                .trim_end_matches('/')
                .to_string(),
            timeout: model_timeout,
        },
        execution_timeout,
    })
}

fn resolve_secret(
    secret: &Secret,
    environment: &impl Environment,
) -> Result<String, MakeRuntimeConfigurationError> {
    match secret {
        Secret::Plain(value) => Ok(value.clone()),
        Secret::FromEnvironment { variable } => environment.read(variable).map_err(|error| {
            MakeRuntimeConfigurationError::MissingEnvironmentVariable {
                variable: variable.clone(),
                message: error.to_string(),
            }
        }),
    }
}

fn positive_seconds(
    setting: &'static str,
    seconds: u64,
) -> Result<Duration, MakeRuntimeConfigurationError> {
    if seconds == 0 {
        Err(MakeRuntimeConfigurationError::InvalidSetting {
            setting,
            message: "must be at least one second".to_string(),
        })
    } else {
        Ok(Duration::from_secs(seconds))
    }
}
