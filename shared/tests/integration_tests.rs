//! Integration tests for the Pulsewatch shared library.
//!
//! These tests exercise the complete flow of producers appending records to a
//! file-backed event log and the aggregation engine and service metrics
//! replaying it.

use serde_json::json;
use shared::aggregation::AggregationEngine;
use shared::config::AggregationConfig;
use shared::models::LogRecord;
use shared::registry::ServiceMetrics;
use shared::storage::{EventLog, FileEventLog};
use shared::MetricsRecorder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a file event log inside a fresh temporary directory.
fn temp_log() -> (TempDir, PathBuf, Arc<FileEventLog>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("metrics.log");
    let log = FileEventLog::new_shared(&path);
    (dir, path, log)
}

/// Appends raw text to the log file, bypassing the record encoder.
fn append_raw(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

// ============================================================================
// EVENT LOG TESTS
// ============================================================================

mod event_log {
    use super::*;

    #[test]
    fn test_append_creates_parent_directory() {
        let (_dir, path, log) = temp_log();
        log.append(&LogRecord::new("svc", "db_query", 1.0)).unwrap();

        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let (_dir, _path, log) = temp_log();
        let record = LogRecord::new("order-service", "order_created", 1.0)
            .with_tag("orderId", "o-42")
            .with_tag("itemCount", 3);
        log.append(&record).unwrap();

        let read: Vec<LogRecord> = log.read_all().unwrap().collect();

        assert_eq!(read.len(), 1);
        assert_eq!(read[0].timestamp, record.timestamp);
        assert_eq!(read[0].metric, "order_created");
        assert!((read[0].value - 1.0).abs() < f64::EPSILON);
        assert_eq!(read[0].tags.get("orderId"), Some(&json!("o-42")));
        assert_eq!(read[0].tags.get("itemCount"), Some(&json!(3)));
    }

    #[test]
    fn test_read_all_is_repeatable() {
        let (_dir, _path, log) = temp_log();
        for i in 0..5 {
            log.append(&LogRecord::new("svc", "http_request", f64::from(i)))
                .unwrap();
        }

        let first: Vec<LogRecord> = log.read_all().unwrap().collect();
        let second: Vec<LogRecord> = log.read_all().unwrap().collect();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_and_blank_lines_are_skipped() {
        let (_dir, path, log) = temp_log();
        log.append(&LogRecord::new("svc", "db_query", 5.0)).unwrap();
        append_raw(&path, "\n   \nnot json at all\n{\"metric\":\"db_query\",\"value\":1}\n");
        log.append(&LogRecord::new("svc", "db_query", 150.0)).unwrap();
        append_raw(&path, "{\"timestamp\":\"2024-01-01T00:00:00Z\",\"metric\":\"db_q");

        let values: Vec<f64> = log.read_all().unwrap().map(|r| r.value).collect();

        assert_eq!(values, vec![5.0, 150.0]);
    }

    #[test]
    fn test_foreign_lines_with_defaults_are_accepted() {
        let (_dir, path, log) = temp_log();
        append_raw(
            &path,
            "{\"timestamp\":\"2024-05-01T10:00:00.000Z\",\"metric\":\"authentication\",\"value\":1}\n",
        );

        let read: Vec<LogRecord> = log.read_all().unwrap().collect();

        assert_eq!(read.len(), 1);
        assert_eq!(read[0].service, "");
        assert!(read[0].tags.is_empty());
    }

    #[test]
    fn test_concurrent_appends_never_interleave() {
        let (_dir, path, log) = temp_log();
        let threads = 8;
        let per_thread = 200;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        let record = LogRecord::new(format!("worker-{t}"), "http_request", 1.0)
                            .with_tag("path", format!("/items/{i}"))
                            .with_tag("padding", "x".repeat(512));
                        log.append(&record).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), threads * per_thread);
        assert_eq!(log.read_all().unwrap().count(), threads * per_thread);
    }

    #[test]
    fn test_non_finite_values_are_rejected_not_dropped() {
        let (_dir, path, log) = temp_log();
        let recorder = MetricsRecorder::new("svc", log.clone());

        assert!(recorder.http_request("GET", "/", 200, f64::INFINITY).is_err());
        assert!(log.append(&LogRecord::new("svc", "http_request", f64::NAN)).is_err());
        recorder.http_request("GET", "/", 200, 12.0).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(log.read_all().unwrap().count(), 1);
    }

    #[test]
    fn test_separate_handles_share_the_file() {
        let (_dir, path, log) = temp_log();
        let other = FileEventLog::new(&path);

        log.append(&LogRecord::new("a", "db_query", 1.0)).unwrap();
        other.append(&LogRecord::new("b", "db_query", 2.0)).unwrap();

        assert_eq!(log.read_all().unwrap().count(), 2);
    }
}

// ============================================================================
// AGGREGATION TESTS
// ============================================================================

mod aggregation {
    use super::*;

    #[test]
    fn test_recorded_events_show_up_in_snapshot() {
        let (_dir, _path, log) = temp_log();
        let recorder = MetricsRecorder::new("user-service", log.clone());

        recorder.http_request("POST", "/login", 200, 42.0).unwrap();
        recorder.http_request("POST", "/login", 401, 8.0).unwrap();
        recorder.authentication(true, "a@example.com").unwrap();
        recorder.authentication(false, "b@example.com").unwrap();
        recorder.db_query("SELECT * FROM users", 12.0).unwrap();
        recorder.db_query("UPDATE users SET name = $1", 180.0).unwrap();
        recorder.db_error("DELETE FROM users", &"timeout").unwrap();
        recorder.order_created("o-1", "u-1", 2, 3000.0).unwrap();

        let engine = AggregationEngine::new(log, AggregationConfig::default()).unwrap();
        let snapshot = engine.compute_snapshot();

        let http = snapshot.http.unwrap();
        assert_eq!(http.total_requests, 2);
        assert_eq!(http.avg_response_time, "25.00");
        assert_eq!(http.status_codes.success, 1);
        assert_eq!(http.status_codes.client_error, 1);

        let auth = snapshot.auth.unwrap();
        assert_eq!(auth.success_rate, "50.00%");

        let db = snapshot.database.unwrap();
        assert_eq!(db.total_queries, 2);
        assert_eq!(db.slow_queries, 1);
        assert_eq!(db.slow_queries_percent, "50.00%");

        assert_eq!(snapshot.errors.total_errors, 1);
        assert_eq!(snapshot.orders.total_orders, 1);
        assert_eq!(snapshot.orders.avg_order_value.as_deref(), Some("2000.00"));
    }

    #[test]
    fn test_missing_log_file_gives_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileEventLog::new_shared(dir.path().join("missing.log"));
        let engine = AggregationEngine::new(log, AggregationConfig::default()).unwrap();

        let snapshot = engine.compute_snapshot();

        assert!(snapshot.http.is_none());
        assert!(snapshot.auth.is_none());
        assert!(snapshot.database.is_none());
        assert_eq!(snapshot.errors.total_errors, 0);
        assert_eq!(snapshot.orders.total_orders, 0);
    }

    #[test]
    fn test_snapshot_json_uses_camel_case() {
        let (_dir, _path, log) = temp_log();
        MetricsRecorder::new("svc", log.clone())
            .http_request("GET", "/", 200, 1.0)
            .unwrap();
        let engine = AggregationEngine::new(log, AggregationConfig::default()).unwrap();

        let json = serde_json::to_value(engine.compute_snapshot()).unwrap();

        assert_eq!(json["http"]["totalRequests"], 1);
        assert_eq!(json["http"]["statusCodes"]["2xx"], 1);
        assert_eq!(json["http"]["recentRequests"][0]["metric"], "http_request");
        assert!(json["systemUptime"].as_str().unwrap().ends_with('s'));
    }

    #[test]
    fn test_recent_records_from_file() {
        let (_dir, _path, log) = temp_log();
        let recorder = MetricsRecorder::new("svc", log.clone());
        for i in 0..12 {
            recorder.db_query(&format!("SELECT {i}"), 1.0).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let engine = AggregationEngine::new(log, AggregationConfig::default()).unwrap();

        let recent = engine.recent_records(10);

        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].tag_str("query"), Some("SELECT 11".to_string()));
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }
}

// ============================================================================
// SERVICE METRICS TESTS
// ============================================================================

mod service_metrics {
    use super::*;

    #[test]
    fn test_log_replay_into_exposition() {
        let (_dir, _path, log) = temp_log();
        let recorder = MetricsRecorder::new("order-service", log.clone());
        recorder.http_request("GET", "/orders", 200, 30.0).unwrap();
        recorder.http_request("GET", "/orders", 200, 70.0).unwrap();
        recorder.order_created("o-1", "u-1", 1, 1500.0).unwrap();
        recorder.order_created("o-2", "u-1", 2, 500.0).unwrap();
        recorder.db_query("select id from orders", 3.0).unwrap();

        let metrics = ServiceMetrics::new("order-service").unwrap();
        let mut applied = 0;
        for record in log.read_all().unwrap() {
            if metrics.ingest(&record).unwrap() {
                applied += 1;
            }
        }
        let text = metrics.export().unwrap();

        assert_eq!(applied, 7);
        assert!(text.contains(
            "http_requests_total_order-service{method=\"GET\",path=\"/orders\",status=\"200\"} 2\n"
        ));
        assert!(text.contains(
            "http_request_duration_ms_order-service_bucket{method=\"GET\",path=\"/orders\",le=\"50\"} 1\n"
        ));
        assert!(text.contains("orders_total_order-service 2\n"));
        assert!(text.contains("orders_amount_order-service 2000\n"));
        assert!(text.contains(
            "db_query_duration_ms_order-service_count{query_type=\"SELECT\"} 1\n"
        ));
        assert!(text.contains("# TYPE app_uptime_seconds_order-service gauge\n"));
    }
}
