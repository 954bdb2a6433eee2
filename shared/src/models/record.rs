//! Event log record model.
//!
//! A `LogRecord` is one line of the metrics log: a timestamped, service-scoped
//! measurement named by its `metric` discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

/// Discriminator for HTTP request records (value = response time in ms).
pub const HTTP_REQUEST: &str = "http_request";
/// Discriminator for database error records (value = 1).
pub const DB_ERROR: &str = "db_error";
/// Discriminator for database query records (value = duration in ms).
pub const DB_QUERY: &str = "db_query";
/// Discriminator for authentication attempts (value = 1 success, 0 failure).
pub const AUTHENTICATION: &str = "authentication";
/// Discriminator for created orders (value = 1).
pub const ORDER_CREATED: &str = "order_created";
/// Discriminator for order totals (value = order amount).
pub const ORDER_TOTAL: &str = "order_total";

/// A single structured record of the metrics event log.
///
/// # Example
///
/// ```
/// use shared::models::LogRecord;
///
/// let record = LogRecord::new("user-service", "http_request", 42.0)
///     .with_tag("method", "GET")
///     .with_tag("statusCode", 200);
///
/// assert!(record.validate_record().is_ok());
/// assert_eq!(record.tag_f64("statusCode"), Some(200.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LogRecord {
    /// When the measurement was taken.
    pub timestamp: DateTime<Utc>,

    /// Name of the service that produced the record.
    #[serde(default)]
    pub service: String,

    /// Discriminator naming the record's semantic kind.
    #[validate(length(min = 1, message = "Metric discriminator cannot be empty"))]
    pub metric: String,

    /// Duration, boolean-as-0/1, count or amount depending on `metric`.
    pub value: f64,

    /// Scalar tags.
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
}

/// Errors that can occur during record validation.
#[derive(Debug, Error)]
pub enum RecordValidationError {
    /// The discriminator is empty.
    #[error("Metric discriminator cannot be empty")]
    EmptyMetric,

    /// The value is NaN or infinite.
    #[error("Record value must be finite")]
    NonFiniteValue,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl LogRecord {
    /// Creates a new record with the current timestamp and no tags.
    #[must_use]
    pub fn new(service: impl Into<String>, metric: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            service: service.into(),
            metric: metric.into(),
            value,
            tags: BTreeMap::new(),
        }
    }

    /// Adds a tag to the record.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.tags.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
        self
    }

    /// Sets the timestamp of the record.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns a tag as a string. Numbers and booleans are rendered as text.
    #[must_use]
    pub fn tag_str(&self, key: &str) -> Option<String> {
        match self.tags.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns a tag as a number. Numeric strings are parsed.
    #[must_use]
    pub fn tag_f64(&self, key: &str) -> Option<f64> {
        match self.tags.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Parses one log line. Returns `None` for blank, malformed or invalid lines.
    #[must_use]
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        let record: Self = serde_json::from_slice(trimmed).ok()?;
        record.validate_record().ok()?;
        Some(record)
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The discriminator is empty
    /// - The value is not finite
    pub fn validate_record(&self) -> Result<(), RecordValidationError> {
        if self.metric.is_empty() {
            return Err(RecordValidationError::EmptyMetric);
        }
        if !self.value.is_finite() {
            return Err(RecordValidationError::NonFiniteValue);
        }
        self.validate()?;
        Ok(())
    }
}
