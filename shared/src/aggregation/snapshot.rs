//! Aggregate snapshot model.
//!
//! A snapshot is derived from one full pass over the event log. Field names
//! serialize in camelCase to keep the JSON dump stable for downstream readers.

use crate::models::LogRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time statistics computed from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    /// When the snapshot was computed.
    pub timestamp: DateTime<Utc>,

    /// HTTP request statistics, absent when no requests were logged.
    pub http: Option<HttpStats>,

    /// Database error statistics.
    pub errors: ErrorStats,

    /// Authentication statistics, absent when no attempts were logged.
    pub auth: Option<AuthStats>,

    /// Order statistics.
    pub orders: OrderStats,

    /// Database query statistics, absent when no queries were logged.
    pub database: Option<DatabaseStats>,

    /// Whole seconds since the engine was created, formatted as `"<secs>s"`.
    pub system_uptime: String,
}

impl AggregateSnapshot {
    /// A snapshot with every optional section absent and zeroed counters.
    #[must_use]
    pub fn empty(system_uptime: String) -> Self {
        Self {
            timestamp: Utc::now(),
            http: None,
            errors: ErrorStats::default(),
            auth: None,
            orders: OrderStats::default(),
            database: None,
            system_uptime,
        }
    }
}

/// Response counts by status class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeCounts {
    /// Status codes in `[200, 300)`.
    #[serde(rename = "2xx")]
    pub success: usize,
    /// Status codes in `[400, 500)`.
    #[serde(rename = "4xx")]
    pub client_error: usize,
    /// Status codes `>= 500`.
    #[serde(rename = "5xx")]
    pub server_error: usize,
}

/// Statistics over `http_request` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpStats {
    /// Number of requests.
    pub total_requests: usize,
    /// Mean response time in ms, two decimals.
    pub avg_response_time: String,
    /// Slowest response time in ms.
    pub max_response_time: f64,
    /// Fastest response time in ms.
    pub min_response_time: f64,
    /// Requests per status class.
    pub status_codes: StatusCodeCounts,
    /// Most recent requests in log order.
    pub recent_requests: Vec<LogRecord>,
}

/// Statistics over `db_error` records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    /// Number of database errors.
    pub total_errors: usize,
    /// Most recent errors in log order.
    pub recent_errors: Vec<LogRecord>,
}

/// Statistics over `authentication` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStats {
    /// Number of authentication attempts.
    pub total_attempts: usize,
    /// Attempts with value 1.
    pub successful: usize,
    /// Attempts with value 0.
    pub failed: usize,
    /// `successful / total_attempts` as `"xx.xx%"`.
    pub success_rate: String,
    /// Most recent attempts in log order.
    pub recent_attempts: Vec<LogRecord>,
}

/// Statistics over `order_created` records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// Number of created orders.
    pub total_orders: usize,
    /// Estimated from item counts only, not from real order totals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_order_value: Option<String>,
    /// Most recent orders in log order.
    pub recent_orders: Vec<LogRecord>,
}

/// Statistics over `db_query` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    /// Number of queries.
    pub total_queries: usize,
    /// Mean query time in ms, two decimals.
    pub avg_query_time: String,
    /// Slowest query time in ms.
    pub max_query_time: f64,
    /// Queries slower than the configured threshold.
    pub slow_queries: usize,
    /// `slow_queries / total_queries` as `"xx.xx%"`.
    pub slow_queries_percent: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_shape() {
        let snapshot = AggregateSnapshot::empty("0s".to_string());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json["http"].is_null());
        assert!(json["auth"].is_null());
        assert!(json["database"].is_null());
        assert_eq!(json["errors"]["totalErrors"], 0);
        assert_eq!(json["orders"]["totalOrders"], 0);
        assert!(json["orders"].get("avgOrderValue").is_none());
        assert_eq!(json["systemUptime"], "0s");
    }

    #[test]
    fn test_status_code_keys() {
        let counts = StatusCodeCounts {
            success: 3,
            client_error: 1,
            server_error: 2,
        };
        let json = serde_json::to_value(counts).unwrap();

        assert_eq!(json["2xx"], 3);
        assert_eq!(json["4xx"], 1);
        assert_eq!(json["5xx"], 2);
    }
}
