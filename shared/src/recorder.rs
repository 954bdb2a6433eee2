//! Producer-side helpers for writing metric records.
//!
//! `MetricsRecorder` turns domain events (HTTP requests, database queries,
//! logins, orders) into [`LogRecord`]s on an [`EventLog`] and emits a matching
//! tracing event, so services never assemble record tags by hand.

use crate::models::record::{
    AUTHENTICATION, DB_ERROR, DB_QUERY, HTTP_REQUEST, ORDER_CREATED, ORDER_TOTAL,
};
use crate::models::LogRecord;
use crate::storage::{EventLog, EventLogError};
use serde::Serialize;
use std::sync::Arc;

/// Longest query prefix stored in record tags.
const QUERY_TAG_CHARS: usize = 50;
/// Longest query prefix included in error events.
const QUERY_LOG_CHARS: usize = 100;

/// Writes metric records for one service.
#[derive(Clone)]
pub struct MetricsRecorder {
    service: String,
    log: Arc<dyn EventLog>,
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// Creates a recorder writing records for `service` to `log`.
    #[must_use]
    pub fn new(service: impl Into<String>, log: Arc<dyn EventLog>) -> Self {
        Self {
            service: service.into(),
            log,
        }
    }

    /// The service name stamped on every record.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Appends a record with arbitrary tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn metric<K, V>(
        &self,
        name: &str,
        value: f64,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), EventLogError>
    where
        K: Into<String>,
        V: Serialize,
    {
        let record = tags
            .into_iter()
            .fold(LogRecord::new(&self.service, name, value), |r, (k, v)| {
                r.with_tag(k, v)
            });
        self.log.append(&record)
    }

    /// Records a finished HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn http_request(
        &self,
        method: &str,
        path: &str,
        status_code: u16,
        response_time_ms: f64,
    ) -> Result<(), EventLogError> {
        let record = LogRecord::new(&self.service, HTTP_REQUEST, response_time_ms)
            .with_tag("method", method)
            .with_tag("path", path)
            .with_tag("statusCode", status_code);
        self.log.append(&record)?;

        tracing::info!(
            service = %self.service,
            method,
            path,
            status_code,
            response_time_ms,
            "HTTP request"
        );
        Ok(())
    }

    /// Records a successful database query.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn db_query(&self, query: &str, duration_ms: f64) -> Result<(), EventLogError> {
        let record = LogRecord::new(&self.service, DB_QUERY, duration_ms)
            .with_tag("query", truncate_chars(query, QUERY_TAG_CHARS));
        self.log.append(&record)
    }

    /// Records a failed database query.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn db_error(
        &self,
        query: &str,
        error: &dyn std::fmt::Display,
    ) -> Result<(), EventLogError> {
        tracing::error!(
            service = %self.service,
            query = truncate_chars(query, QUERY_LOG_CHARS),
            error = %error,
            "Database error"
        );

        let record = LogRecord::new(&self.service, DB_ERROR, 1.0)
            .with_tag("query", truncate_chars(query, QUERY_TAG_CHARS));
        self.log.append(&record)
    }

    /// Records an authentication attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended.
    pub fn authentication(&self, success: bool, email: &str) -> Result<(), EventLogError> {
        if success {
            tracing::info!(service = %self.service, email, "User authenticated");
        } else {
            tracing::info!(service = %self.service, email, "Authentication failed");
        }

        let record = LogRecord::new(&self.service, AUTHENTICATION, if success { 1.0 } else { 0.0 })
            .with_tag("email", email)
            .with_tag("result", if success { "success" } else { "failure" });
        self.log.append(&record)
    }

    /// Records a created order as an `order_created` and an `order_total` record.
    ///
    /// # Errors
    ///
    /// Returns an error if either record cannot be appended.
    pub fn order_created(
        &self,
        order_id: &str,
        user_id: &str,
        item_count: u32,
        total: f64,
    ) -> Result<(), EventLogError> {
        tracing::info!(
            service = %self.service,
            order_id,
            user_id,
            item_count,
            total,
            "Order created"
        );

        let created = LogRecord::new(&self.service, ORDER_CREATED, 1.0)
            .with_tag("orderId", order_id)
            .with_tag("itemCount", item_count);
        self.log.append(&created)?;

        let amount = LogRecord::new(&self.service, ORDER_TOTAL, total).with_tag("orderId", order_id);
        self.log.append(&amount)
    }
}

/// Returns at most `max` characters of `s`, never splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEventLog;
    use serde_json::json;

    fn recorder() -> (MetricsRecorder, Arc<InMemoryEventLog>) {
        let log = InMemoryEventLog::new_shared();
        (MetricsRecorder::new("user-service", log.clone()), log)
    }

    #[test]
    fn test_http_request_record() {
        let (recorder, log) = recorder();
        recorder.http_request("GET", "/profile", 200, 35.0).unwrap();

        let records: Vec<LogRecord> = log.read_all().unwrap().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service, "user-service");
        assert_eq!(records[0].metric, HTTP_REQUEST);
        assert_eq!(records[0].tags.get("statusCode"), Some(&json!(200)));
        assert_eq!(records[0].tags.get("path"), Some(&json!("/profile")));
    }

    #[test]
    fn test_db_query_truncates_query_tag() {
        let (recorder, log) = recorder();
        let query = "SELECT ".repeat(20);
        recorder.db_query(&query, 4.0).unwrap();

        let record = log.read_all().unwrap().next().unwrap();
        assert_eq!(record.tag_str("query").unwrap().chars().count(), 50);
    }

    #[test]
    fn test_db_error_record() {
        let (recorder, log) = recorder();
        recorder
            .db_error("INSERT INTO users", &"duplicate key")
            .unwrap();

        let record = log.read_all().unwrap().next().unwrap();
        assert_eq!(record.metric, DB_ERROR);
        assert!((record.value - 1.0).abs() < f64::EPSILON);
        assert_eq!(record.tag_str("query"), Some("INSERT INTO users".to_string()));
    }

    #[test]
    fn test_authentication_records_value_and_result() {
        let (recorder, log) = recorder();
        recorder.authentication(true, "a@example.com").unwrap();
        recorder.authentication(false, "b@example.com").unwrap();

        let records: Vec<LogRecord> = log.read_all().unwrap().collect();
        assert_eq!(records[0].value, 1.0);
        assert_eq!(records[0].tag_str("result"), Some("success".to_string()));
        assert_eq!(records[1].value, 0.0);
        assert_eq!(records[1].tag_str("result"), Some("failure".to_string()));
    }

    #[test]
    fn test_order_created_writes_two_records() {
        let (recorder, log) = recorder();
        recorder.order_created("o-1", "u-1", 3, 4500.0).unwrap();

        let records: Vec<LogRecord> = log.read_all().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metric, ORDER_CREATED);
        assert_eq!(records[0].tag_f64("itemCount"), Some(3.0));
        assert_eq!(records[1].metric, ORDER_TOTAL);
        assert_eq!(records[1].value, 4500.0);
    }

    #[test]
    fn test_metric_with_custom_tags() {
        let (recorder, log) = recorder();
        recorder
            .metric("cache_hit", 1.0, [("cache", json!("products")), ("size", json!(12))])
            .unwrap();

        let record = log.read_all().unwrap().next().unwrap();
        assert_eq!(record.metric, "cache_hit");
        assert_eq!(record.tag_f64("size"), Some(12.0));
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }
}
