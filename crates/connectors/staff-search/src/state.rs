//! Transient state used by the gateway.
//!
//! This is initialized on startup and shared, read-only, by every request.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info_span, Instrument};

use query_engine_execution::metrics::Metrics;
use query_engine_execution::mysql::{MySqlStore, PoolOptions};
use query_engine_execution::store::ConnectionProvider;
use query_engine_metadata::metadata::SchemaDescriptor;
use query_engine_translation::translation::{
    GeminiModel, GeminiSettings, LanguageModel, ModelError, Translator,
};
use staff_search_configuration::Configuration;

/// State for the gateway.
#[derive(Clone)]
pub struct State {
    pub translator: Translator,
    pub store: Arc<dyn ConnectionProvider>,
    /// Present when the store is a connection pool whose gauges can be exported.
    pub pool: Option<MySqlStore>,
    pub metrics: Metrics,
    pub metrics_registry: prometheus::Registry,
    pub execution_timeout: Duration,
}

impl State {
    /// Assemble a state from already constructed collaborators.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn ConnectionProvider>,
        schema: SchemaDescriptor,
        translation_timeout: Duration,
        execution_timeout: Duration,
    ) -> Result<State, InitializationError> {
        let mut metrics_registry = prometheus::Registry::new();
        let metrics = Metrics::initialize(&mut metrics_registry)
            .map_err(InitializationError::MetricsError)?;

        Ok(State {
            translator: Translator::new(model, Arc::new(schema), translation_timeout),
            store,
            pool: None,
            metrics,
            metrics_registry,
            execution_timeout,
        })
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        self.translator.schema()
    }

    /// Refresh the gauges that can only be polled.
    pub fn fetch_metrics(&self) {
        if let Some(pool) = &self.pool {
            self.metrics.update_pool_metrics(pool.pool());
        }
    }
}

/// Create the language model client and the connection pool, and wrap them inside a State.
pub async fn create_state(configuration: Configuration) -> Result<State, InitializationError> {
    let model = GeminiModel::new(GeminiSettings {
        api_key: configuration.language_model.api_key.clone(),
        model: configuration.language_model.model.clone(),
        endpoint: configuration.language_model.endpoint.clone(),
        request_timeout: configuration.language_model.timeout,
    })
    .map_err(InitializationError::LanguageModel)?;

    let pool_settings = &configuration.pool_settings;
    let store = async {
        MySqlStore::connect_lazy(
            &configuration.connection_uri,
            &PoolOptions {
                max_connections: pool_settings.max_connections,
                acquire_timeout: Duration::from_secs(pool_settings.pool_timeout),
                idle_timeout: pool_settings.idle_timeout.map(Duration::from_secs),
                max_lifetime: pool_settings.connection_lifetime.map(Duration::from_secs),
            },
        )
        .map_err(InitializationError::UnableToCreatePool)
    }
    .instrument(info_span!("Create connection pool"))
    .await?;

    let mut state = State::new(
        Arc::new(model),
        Arc::new(store.clone()),
        configuration.schema,
        configuration.language_model.timeout,
        configuration.execution_timeout,
    )?;
    state.pool = Some(store);
    Ok(state)
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(sqlx::Error),
    #[error("unable to initialize the language model client: {0}")]
    LanguageModel(ModelError),
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
}
