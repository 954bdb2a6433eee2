//! Log-replaying aggregation engine.

use super::snapshot::{
    AggregateSnapshot, AuthStats, DatabaseStats, ErrorStats, HttpStats, OrderStats,
    StatusCodeCounts,
};
use crate::config::{AggregationConfig, AggregationConfigError};
use crate::models::record::{AUTHENTICATION, DB_ERROR, DB_QUERY, HTTP_REQUEST, ORDER_CREATED};
use crate::models::LogRecord;
use crate::storage::EventLog;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Records of one pass over the log, grouped by discriminator.
#[derive(Default)]
struct Partitions {
    http: Vec<LogRecord>,
    errors: Vec<LogRecord>,
    auth: Vec<LogRecord>,
    orders: Vec<LogRecord>,
    queries: Vec<LogRecord>,
}

impl Partitions {
    fn from_records(records: impl Iterator<Item = LogRecord>) -> Self {
        let mut partitions = Self::default();
        for record in records {
            let bucket = match record.metric.as_str() {
                HTTP_REQUEST => &mut partitions.http,
                DB_ERROR => &mut partitions.errors,
                AUTHENTICATION => &mut partitions.auth,
                ORDER_CREATED => &mut partitions.orders,
                DB_QUERY => &mut partitions.queries,
                _ => continue,
            };
            bucket.push(record);
        }
        partitions
    }
}

/// Recomputes dashboard statistics from the full event log on every call.
///
/// # Example
///
/// ```
/// use shared::aggregation::AggregationEngine;
/// use shared::config::AggregationConfig;
/// use shared::models::LogRecord;
/// use shared::storage::{EventLog, InMemoryEventLog};
///
/// let log = InMemoryEventLog::new_shared();
/// log.append(&LogRecord::new("auth", "authentication", 1.0)).unwrap();
/// log.append(&LogRecord::new("auth", "authentication", 0.0)).unwrap();
///
/// let engine = AggregationEngine::new(log, AggregationConfig::default()).unwrap();
/// let snapshot = engine.compute_snapshot();
///
/// assert_eq!(snapshot.auth.unwrap().success_rate, "50.00%");
/// ```
pub struct AggregationEngine {
    log: Arc<dyn EventLog>,
    config: AggregationConfig,
    started: Instant,
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("config", &self.config)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl AggregationEngine {
    /// Creates an engine over `log`. The uptime clock starts now.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(
        log: Arc<dyn EventLog>,
        config: AggregationConfig,
    ) -> Result<Self, AggregationConfigError> {
        config.validate_config()?;
        Ok(Self {
            log,
            config,
            started: Instant::now(),
        })
    }

    /// The configuration the engine was created with.
    #[must_use]
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Whole seconds since the engine was created, as `"<secs>s"`.
    #[must_use]
    pub fn uptime(&self) -> String {
        format!("{}s", self.started.elapsed().as_secs())
    }

    /// Reads the whole log once and computes a fresh snapshot.
    ///
    /// A missing or unreadable log yields an empty snapshot.
    #[must_use]
    pub fn compute_snapshot(&self) -> AggregateSnapshot {
        let records = match self.log.read_all() {
            Ok(records) => records,
            Err(e) => {
                tracing::debug!(error = %e, "Event log unavailable, returning empty snapshot");
                return AggregateSnapshot::empty(self.uptime());
            }
        };

        let partitions = Partitions::from_records(records);
        tracing::debug!(
            http = partitions.http.len(),
            errors = partitions.errors.len(),
            auth = partitions.auth.len(),
            orders = partitions.orders.len(),
            queries = partitions.queries.len(),
            "Event log replayed"
        );

        AggregateSnapshot {
            timestamp: Utc::now(),
            http: self.http_stats(&partitions.http),
            errors: self.error_stats(&partitions.errors),
            auth: self.auth_stats(&partitions.auth),
            orders: self.order_stats(&partitions.orders),
            database: self.database_stats(&partitions.queries),
            system_uptime: self.uptime(),
        }
    }

    /// Returns up to `count` records of any kind, newest first.
    ///
    /// Records with equal timestamps keep their log order. A missing or
    /// unreadable log yields an empty list.
    #[must_use]
    pub fn recent_records(&self, count: usize) -> Vec<LogRecord> {
        let mut records: Vec<LogRecord> = match self.log.read_all() {
            Ok(records) => records.collect(),
            Err(e) => {
                tracing::debug!(error = %e, "Event log unavailable, no records to show");
                return Vec::new();
            }
        };

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(count);
        records
    }

    fn http_stats(&self, requests: &[LogRecord]) -> Option<HttpStats> {
        if requests.is_empty() {
            return None;
        }

        let mut status_codes = StatusCodeCounts::default();
        for code in requests.iter().filter_map(|r| r.tag_f64("statusCode")) {
            if (200.0..300.0).contains(&code) {
                status_codes.success += 1;
            } else if (400.0..500.0).contains(&code) {
                status_codes.client_error += 1;
            } else if code >= 500.0 {
                status_codes.server_error += 1;
            }
        }

        Some(HttpStats {
            total_requests: requests.len(),
            avg_response_time: fixed2(mean(requests.iter().map(|r| r.value))),
            max_response_time: requests.iter().map(|r| r.value).fold(f64::MIN, f64::max),
            min_response_time: requests.iter().map(|r| r.value).fold(f64::MAX, f64::min),
            status_codes,
            recent_requests: tail(requests, self.config.recent_requests),
        })
    }

    fn error_stats(&self, errors: &[LogRecord]) -> ErrorStats {
        ErrorStats {
            total_errors: errors.len(),
            recent_errors: tail(errors, self.config.recent_errors),
        }
    }

    #[allow(clippy::float_cmp)]
    fn auth_stats(&self, attempts: &[LogRecord]) -> Option<AuthStats> {
        if attempts.is_empty() {
            return None;
        }

        let successful = attempts.iter().filter(|a| a.value == 1.0).count();
        let failed = attempts.iter().filter(|a| a.value == 0.0).count();

        Some(AuthStats {
            total_attempts: attempts.len(),
            successful,
            failed,
            success_rate: percent(successful, attempts.len()),
            recent_attempts: tail(attempts, self.config.recent_attempts),
        })
    }

    fn order_stats(&self, orders: &[LogRecord]) -> OrderStats {
        if orders.is_empty() {
            return OrderStats::default();
        }

        let placeholder = self.config.order_value_placeholder;
        let estimates = orders
            .iter()
            .map(|o| o.tag_f64("itemCount").map_or(0.0, |n| placeholder * n));

        OrderStats {
            total_orders: orders.len(),
            avg_order_value: Some(fixed2(mean(estimates))),
            recent_orders: tail(orders, self.config.recent_orders),
        }
    }

    fn database_stats(&self, queries: &[LogRecord]) -> Option<DatabaseStats> {
        if queries.is_empty() {
            return None;
        }

        let threshold = self.config.slow_query_threshold_ms;
        let slow_queries = queries.iter().filter(|q| q.value > threshold).count();

        Some(DatabaseStats {
            total_queries: queries.len(),
            avg_query_time: fixed2(mean(queries.iter().map(|q| q.value))),
            max_query_time: queries.iter().map(|q| q.value).fold(f64::MIN, f64::max),
            slow_queries,
            slow_queries_percent: percent(slow_queries, queries.len()),
        })
    }
}

/// The last `n` records, in log order.
fn tail(records: &[LogRecord], n: usize) -> Vec<LogRecord> {
    records[records.len().saturating_sub(n)..].to_vec()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, total: usize) -> String {
    fixed2(part as f64 / total as f64 * 100.0) + "%"
}

fn fixed2(value: f64) -> String {
    format!("{value:.2}")
}
