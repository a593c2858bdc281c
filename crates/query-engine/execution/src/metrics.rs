//! Metrics setup and update for the gateway.

use std::time::Duration;

use prometheus::core::{AtomicF64, AtomicI64, AtomicU64, GenericCounter, GenericGauge};
use prometheus::{Histogram, HistogramOpts, Registry};

/// The collection of all metrics exposed through the `/metrics` endpoint.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub query_total: GenericCounter<AtomicU64>,
    pub query_success_total: GenericCounter<AtomicU64>,
    pub explain_total: GenericCounter<AtomicU64>,
    pub translation_failure_total: GenericCounter<AtomicU64>,
    pub query_rejected_total: GenericCounter<AtomicU64>,
    pub redaction_conflict_total: GenericCounter<AtomicU64>,
    pub execution_failure_total: GenericCounter<AtomicU64>,
    pub query_duration_seconds: Histogram,
    pub pool_size: GenericGauge<AtomicI64>,
    pub pool_idle_count: GenericGauge<AtomicI64>,
    pub pool_active_count: GenericGauge<AtomicI64>,
    pub pool_max_connections: GenericGauge<AtomicI64>,
    pub pool_acquire_timeout: GenericGauge<AtomicF64>,
    pub pool_idle_timeout: GenericGauge<AtomicF64>,
    pub pool_max_lifetime: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Set up counters and gauges used to produce Prometheus metrics.
    pub fn initialize(metrics_registry: &mut Registry) -> Result<Self, prometheus::Error> {
        let query_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_query_total",
            "Total questions received.",
        )?;

        let query_success_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_query_success_total",
            "Total questions answered successfully.",
        )?;

        let explain_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_explain_total",
            "Total successful explains.",
        )?;

        let translation_failure_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_translation_failure_total",
            "Total questions the language model could not translate.",
        )?;

        let query_rejected_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_query_rejected_total",
            "Total candidate queries rejected by validation.",
        )?;

        let redaction_conflict_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_redaction_conflict_total",
            "Total queries that projected only sensitive columns.",
        )?;

        let execution_failure_total = add_int_counter_metric(
            metrics_registry,
            "staff_search_execution_failure_total",
            "Total queries the store failed to execute.",
        )?;

        let query_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "staff_search_query_duration_seconds",
            "End-to-end time spent answering a question, in seconds.",
        ))?;
        metrics_registry.register(Box::new(query_duration_seconds.clone()))?;

        let pool_size = add_int_gauge_metric(
            metrics_registry,
            "staff_search_pool_size",
            "The number of connections currently active. This includes idle connections.",
        )?;

        let pool_idle_count = add_int_gauge_metric(
            metrics_registry,
            "staff_search_pool_idle",
            "The number of connections active and idle (not in use).",
        )?;

        let pool_active_count = add_int_gauge_metric(
            metrics_registry,
            "staff_search_pool_active",
            "The number of connections current active. This does not include idle connections.",
        )?;

        let pool_max_connections = add_int_gauge_metric(
            metrics_registry,
            "staff_search_pool_max_connections",
            "The maximum number of connections that this pool should maintain.",
        )?;

        let pool_acquire_timeout = add_gauge_metric(
            metrics_registry,
            "staff_search_pool_acquire_timeout",
            "Get the maximum amount of time to spend waiting for a connection, in seconds.",
        )?;

        let pool_idle_timeout = add_gauge_metric(
            metrics_registry,
            "staff_search_pool_idle_timeout",
            "Get the maximum idle duration for individual connections, in seconds.",
        )?;

        let pool_max_lifetime = add_gauge_metric(
            metrics_registry,
            "staff_search_pool_max_lifetime",
            "Get the maximum lifetime of individual connections, in seconds.",
        )?;

        Ok(Self {
            query_total,
            query_success_total,
            explain_total,
            translation_failure_total,
            query_rejected_total,
            redaction_conflict_total,
            execution_failure_total,
            query_duration_seconds,
            pool_size,
            pool_idle_count,
            pool_active_count,
            pool_max_connections,
            pool_acquire_timeout,
            pool_idle_timeout,
            pool_max_lifetime,
        })
    }

    /// Update all pool gauges from the current state of the pool.
    pub fn update_pool_metrics(&self, pool: &sqlx::MySqlPool) {
        let pool_size: i64 = pool.size().into();
        self.pool_size.set(pool_size);

        let pool_idle: i64 = pool.num_idle().try_into().unwrap_or(i64::MAX);
        self.pool_idle_count.set(pool_idle);

        let pool_active: i64 = pool_size - pool_idle;
        self.pool_active_count.set(pool_active);

        let pool_options = pool.options();

        let max_connections: i64 = pool_options.get_max_connections().into();
        self.pool_max_connections.set(max_connections);

        let acquire_timeout: f64 = pool_options.get_acquire_timeout().as_secs_f64();
        self.pool_acquire_timeout.set(acquire_timeout);

        // if nothing is set, return 0
        let idle_timeout: f64 = pool_options
            .get_idle_timeout()
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        self.pool_idle_timeout.set(idle_timeout);

        // if nothing is set, return 0
        let max_lifetime: f64 = pool_options
            .get_max_lifetime()
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        self.pool_max_lifetime.set(max_lifetime);
    }
}

/// Create a new int counter metric and register it with the provided Prometheus Registry
fn add_int_counter_metric(
    metrics_registry: &mut Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericCounter<AtomicU64>, prometheus::Error> {
    let int_counter =
        prometheus::IntCounter::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_counter.clone()))?;
    Ok(int_counter)
}

/// Create a new int gauge metric and register it with the provided Prometheus Registry
fn add_int_gauge_metric(
    metrics_registry: &mut Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicI64>, prometheus::Error> {
    let int_gauge =
        prometheus::IntGauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_gauge.clone()))?;
    Ok(int_gauge)
}

/// Create a new gauge metric and register it with the provided Prometheus Registry
fn add_gauge_metric(
    metrics_registry: &mut Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicF64>, prometheus::Error> {
    let gauge =
        prometheus::Gauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_metric_once() {
        let mut registry = Registry::new();
        let metrics = Metrics::initialize(&mut registry).unwrap();
        metrics.query_total.inc();

        let names: Vec<String> = registry
            .gather()
            .into_iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"staff_search_query_total".to_string()));
        assert!(names.contains(&"staff_search_execution_failure_total".to_string()));
        assert!(names.contains(&"staff_search_pool_size".to_string()));

        assert!(Metrics::initialize(&mut registry).is_err());
    }
}
