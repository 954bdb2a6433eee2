//! Aggregation engine configuration.
//!
//! Controls the slow-query threshold, the size of the "recent" windows shown
//! in each snapshot section, and the per-item value used for the order value
//! estimate.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Errors produced when validating an [`AggregationConfig`].
#[derive(Debug, Error)]
pub enum AggregationConfigError {
    /// The slow-query threshold is negative or not finite.
    #[error("Slow query threshold must be a finite, non-negative number of milliseconds")]
    InvalidSlowQueryThreshold,

    /// The order value placeholder is negative or not finite.
    #[error("Order value placeholder must be a finite, non-negative amount")]
    InvalidOrderValuePlaceholder,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Settings for computing an aggregate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AggregationConfig {
    /// Queries strictly slower than this (ms) count as slow.
    pub slow_query_threshold_ms: f64,

    /// Number of HTTP requests kept in `recentRequests`.
    #[validate(range(min = 1, message = "Recent request window must be at least 1"))]
    pub recent_requests: usize,

    /// Number of database errors kept in `recentErrors`.
    #[validate(range(min = 1, message = "Recent error window must be at least 1"))]
    pub recent_errors: usize,

    /// Number of authentication attempts kept in `recentAttempts`.
    #[validate(range(min = 1, message = "Recent attempt window must be at least 1"))]
    pub recent_attempts: usize,

    /// Number of orders kept in `recentOrders`.
    #[validate(range(min = 1, message = "Recent order window must be at least 1"))]
    pub recent_orders: usize,

    /// Assumed value of one order item when estimating the average order value.
    pub order_value_placeholder: f64,
}

impl AggregationConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slow_query_threshold_ms: 100.0,
            recent_requests: 10,
            recent_errors: 5,
            recent_attempts: 5,
            recent_orders: 5,
            order_value_placeholder: 1000.0,
        }
    }

    /// Sets the slow-query threshold in milliseconds.
    #[must_use]
    pub fn with_slow_query_threshold_ms(mut self, threshold_ms: f64) -> Self {
        self.slow_query_threshold_ms = threshold_ms;
        self
    }

    /// Sets every "recent" window to `size`.
    #[must_use]
    pub fn with_recent_window(mut self, size: usize) -> Self {
        self.recent_requests = size;
        self.recent_errors = size;
        self.recent_attempts = size;
        self.recent_orders = size;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The slow-query threshold is negative or not finite
    /// - The order value placeholder is negative or not finite
    /// - Any recent window is zero
    pub fn validate_config(&self) -> Result<(), AggregationConfigError> {
        if !self.slow_query_threshold_ms.is_finite() || self.slow_query_threshold_ms < 0.0 {
            return Err(AggregationConfigError::InvalidSlowQueryThreshold);
        }
        if !self.order_value_placeholder.is_finite() || self.order_value_placeholder < 0.0 {
            return Err(AggregationConfigError::InvalidOrderValuePlaceholder);
        }
        Validate::validate(self)?;
        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_aggregation_config_default() {
        let config = AggregationConfig::default();
        assert_eq!(config.slow_query_threshold_ms, 100.0);
        assert_eq!(config.recent_requests, 10);
        assert_eq!(config.recent_errors, 5);
        assert_eq!(config.recent_attempts, 5);
        assert_eq!(config.recent_orders, 5);
        assert_eq!(config.order_value_placeholder, 1000.0);
    }

    #[test]
    fn test_aggregation_config_validate_valid() {
        assert!(AggregationConfig::default().validate_config().is_ok());
    }

    #[test]
    fn test_aggregation_config_negative_threshold() {
        let config = AggregationConfig::default().with_slow_query_threshold_ms(-1.0);
        assert!(matches!(
            config.validate_config(),
            Err(AggregationConfigError::InvalidSlowQueryThreshold)
        ));
    }

    #[test]
    fn test_aggregation_config_nan_threshold() {
        let config = AggregationConfig::default().with_slow_query_threshold_ms(f64::NAN);
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_aggregation_config_zero_window() {
        let config = AggregationConfig::default().with_recent_window(0);
        assert!(matches!(
            config.validate_config(),
            Err(AggregationConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_aggregation_config_negative_placeholder() {
        let config = AggregationConfig {
            order_value_placeholder: -5.0,
            ..AggregationConfig::default()
        };
        assert!(matches!(
            config.validate_config(),
            Err(AggregationConfigError::InvalidOrderValuePlaceholder)
        ));
    }

    #[test]
    fn test_aggregation_config_partial_json_uses_defaults() {
        let config: AggregationConfig =
            serde_json::from_str(r#"{"slow_query_threshold_ms": 250.0}"#).unwrap();
        assert_eq!(config.recent_requests, 10);
        assert!((config.slow_query_threshold_ms - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregation_config_serialization() {
        let config = AggregationConfig::default().with_recent_window(3);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AggregationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
