//! Standard metric set for a service.
//!
//! `ServiceMetrics` registers the HTTP, database, order, authentication and
//! uptime metrics every service exposes, and maps event log records onto them
//! so exposition text can also be rebuilt from the log.

use super::{MetricRegistry, RegistryError};
use crate::models::record::{
    AUTHENTICATION, DB_ERROR, DB_QUERY, HTTP_REQUEST, ORDER_CREATED, ORDER_TOTAL,
};
use crate::models::{LabelSet, LogRecord, MetricDefinition};
use std::time::Instant;

/// Total HTTP requests by method, path and status.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// HTTP request duration histogram by method and path.
pub const HTTP_REQUEST_DURATION_MS: &str = "http_request_duration_ms";
/// Database query duration histogram by query type.
pub const DB_QUERY_DURATION_MS: &str = "db_query_duration_ms";
/// Total database errors by error type.
pub const DB_ERRORS_TOTAL: &str = "db_errors_total";
/// Total orders created.
pub const ORDERS_TOTAL: &str = "orders_total";
/// Running amount of all orders.
pub const ORDERS_AMOUNT: &str = "orders_amount";
/// Authentication attempts by result.
pub const USERS_AUTHENTICATED_TOTAL: &str = "users_authenticated_total";
/// Seconds since the metric set was created.
pub const APP_UPTIME_SECONDS: &str = "app_uptime_seconds";

/// Default HTTP duration buckets in milliseconds.
pub const HTTP_DURATION_BUCKETS: [f64; 6] = [10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0];
/// Default database duration buckets in milliseconds.
pub const DB_DURATION_BUCKETS: [f64; 6] = [1.0, 5.0, 10.0, 50.0, 100.0, 500.0];

fn default_definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::counter(HTTP_REQUESTS_TOTAL, "Total HTTP requests")
            .with_label_names(["method", "path", "status"]),
        MetricDefinition::histogram(
            HTTP_REQUEST_DURATION_MS,
            "HTTP request duration in milliseconds",
            HTTP_DURATION_BUCKETS.to_vec(),
        )
        .with_label_names(["method", "path"]),
        MetricDefinition::histogram(
            DB_QUERY_DURATION_MS,
            "Database query duration in milliseconds",
            DB_DURATION_BUCKETS.to_vec(),
        )
        .with_label_names(["query_type"]),
        MetricDefinition::counter(DB_ERRORS_TOTAL, "Total database errors")
            .with_label_names(["error_type"]),
        MetricDefinition::counter(ORDERS_TOTAL, "Total orders created"),
        MetricDefinition::gauge(ORDERS_AMOUNT, "Total orders amount"),
        MetricDefinition::counter(USERS_AUTHENTICATED_TOTAL, "Total authentication attempts")
            .with_label_names(["result"]),
        MetricDefinition::gauge(APP_UPTIME_SECONDS, "Application uptime in seconds"),
    ]
}

/// The standard metric set of one service, backed by its own registry.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: MetricRegistry,
    started: Instant,
}

impl ServiceMetrics {
    /// Creates a registry for `service` with the default metric set registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a default definition cannot be registered.
    pub fn new(service: impl Into<String>) -> Result<Self, RegistryError> {
        let registry = MetricRegistry::new(service);
        for definition in default_definitions() {
            registry.register(definition)?;
        }
        Ok(Self {
            registry,
            started: Instant::now(),
        })
    }

    /// The underlying registry, for custom metrics and reads.
    #[must_use]
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Records one finished HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is not finite.
    pub fn observe_http_request(
        &self,
        method: &str,
        path: &str,
        status: u16,
        duration_ms: f64,
    ) -> Result<(), RegistryError> {
        self.observe_http(method, path, &status.to_string(), duration_ms)
    }

    fn observe_http(
        &self,
        method: &str,
        path: &str,
        status: &str,
        duration_ms: f64,
    ) -> Result<(), RegistryError> {
        let route = LabelSet::new()
            .with_label("method", method)
            .with_label("path", path);
        self.registry.observe_histogram(HTTP_REQUEST_DURATION_MS, &route, duration_ms)?;
        self.registry.increment_counter(
            HTTP_REQUESTS_TOTAL,
            &route.with_label("status", status),
            1.0,
        )
    }

    /// Records one database query duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is not finite.
    pub fn observe_db_query(&self, query_type: &str, duration_ms: f64) -> Result<(), RegistryError> {
        self.registry.observe_histogram(
            DB_QUERY_DURATION_MS,
            &LabelSet::new().with_label("query_type", query_type),
            duration_ms,
        )
    }

    /// Counts one database error.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn record_db_error(&self, error_type: &str) -> Result<(), RegistryError> {
        self.registry.increment_counter(
            DB_ERRORS_TOTAL,
            &LabelSet::new().with_label("error_type", error_type),
            1.0,
        )
    }

    /// Counts one authentication attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn record_authentication(&self, success: bool) -> Result<(), RegistryError> {
        let result = if success { "success" } else { "failure" };
        self.registry.increment_counter(
            USERS_AUTHENTICATED_TOTAL,
            &LabelSet::new().with_label("result", result),
            1.0,
        )
    }

    /// Counts one order and adds its amount to the running total.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not finite.
    pub fn record_order(&self, amount: f64) -> Result<(), RegistryError> {
        self.record_order_created()?;
        self.record_order_amount(amount)
    }

    fn record_order_created(&self) -> Result<(), RegistryError> {
        self.registry.increment_counter(ORDERS_TOTAL, &LabelSet::new(), 1.0)
    }

    fn record_order_amount(&self, amount: f64) -> Result<(), RegistryError> {
        self.registry.add_gauge(ORDERS_AMOUNT, &LabelSet::new(), amount)
    }

    /// Refreshes the uptime gauge.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn update_uptime(&self) -> Result<(), RegistryError> {
        let uptime = self.started.elapsed().as_secs();
        #[allow(clippy::cast_precision_loss)]
        let uptime = uptime as f64;
        self.registry.set_gauge(APP_UPTIME_SECONDS, &LabelSet::new(), uptime)
    }

    /// Refreshes the uptime gauge and renders the exposition text.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn export(&self) -> Result<String, RegistryError> {
        self.update_uptime()?;
        self.registry.export()
    }

    /// Applies one event log record to the metric set.
    ///
    /// Returns `Ok(false)` for discriminators that have no metric mapping and
    /// for authentication values other than `0` or `1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record value cannot be applied.
    pub fn ingest(&self, record: &LogRecord) -> Result<bool, RegistryError> {
        match record.metric.as_str() {
            HTTP_REQUEST => {
                let method = record.tag_str("method").unwrap_or_else(|| "UNKNOWN".into());
                let path = record.tag_str("path").unwrap_or_else(|| "unknown".into());
                let status = record.tag_str("statusCode").unwrap_or_else(|| "unknown".into());
                self.observe_http(&method, &path, &status, record.value)?;
            }
            DB_QUERY => self.observe_db_query(&query_type(record), record.value)?,
            DB_ERROR => self.record_db_error(&query_type(record))?,
            AUTHENTICATION => match auth_outcome(record.value) {
                Some(success) => self.record_authentication(success)?,
                None => return Ok(false),
            },
            ORDER_CREATED => self.record_order_created()?,
            ORDER_TOTAL => self.record_order_amount(record.value)?,
            other => {
                tracing::trace!(metric = %other, "No registry mapping for record");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `1` is a success and `0` a failure; anything else is no outcome.
#[allow(clippy::float_cmp)]
fn auth_outcome(value: f64) -> Option<bool> {
    if value == 1.0 {
        Some(true)
    } else if value == 0.0 {
        Some(false)
    } else {
        None
    }
}

/// First word of the `query` tag, uppercased (`"SELECT FROM users"` -> `"SELECT"`).
fn query_type(record: &LogRecord) -> String {
    record
        .tag_str("query")
        .and_then(|q| q.split_whitespace().next().map(str::to_uppercase))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}
