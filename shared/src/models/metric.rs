//! Metric definition model.
//!
//! Defines `MetricDefinition`, the immutable schema of a registered metric, and
//! the derived histogram view computed from raw samples at export time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use validator::Validate;

/// Type of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// A counter that only increases (e.g., request count).
    Counter,
    /// A gauge that can go up or down (e.g., orders amount, uptime).
    Gauge,
    /// A histogram for measuring distributions (e.g., request latency).
    Histogram,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

/// A cumulative histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (inclusive).
    pub upper_bound: f64,
    /// Number of observations less than or equal to `upper_bound`.
    pub count: u64,
}

/// Histogram data derived from raw samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// The declared buckets, ascending, without the implicit `+Inf` bucket.
    pub buckets: Vec<HistogramBucket>,
    /// The sum of all observed values.
    pub sum: f64,
    /// The total count of observations (the `+Inf` bucket).
    pub count: u64,
}

impl HistogramData {
    /// Computes cumulative buckets for `samples` against ascending `bounds`.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::models::HistogramData;
    ///
    /// let data = HistogramData::from_samples(&[10.0, 50.0, 100.0], &[5.0, 15.0, 60.0, 200.0]);
    /// let counts: Vec<u64> = data.buckets.iter().map(|b| b.count).collect();
    ///
    /// assert_eq!(counts, vec![1, 2, 3]);
    /// assert_eq!(data.count, 4);
    /// ```
    #[must_use]
    pub fn from_samples(bounds: &[f64], samples: &[f64]) -> Self {
        let buckets = bounds
            .iter()
            .map(|&upper_bound| HistogramBucket {
                upper_bound,
                count: samples.iter().filter(|&&v| v <= upper_bound).count() as u64,
            })
            .collect();

        Self {
            buckets,
            sum: samples.iter().sum(),
            count: samples.len() as u64,
        }
    }
}

/// The schema of a registered metric.
///
/// # Example
///
/// ```
/// use shared::models::MetricDefinition;
///
/// let def = MetricDefinition::histogram(
///     "http_request_duration_ms",
///     "HTTP request duration in milliseconds",
///     vec![10.0, 50.0, 100.0],
/// )
/// .with_label_names(["method", "path"]);
///
/// assert!(def.validate_definition().is_ok());
/// assert!(def.declares_label("method"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricDefinition {
    /// The metric name, unique within a registry.
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// The type of metric.
    pub metric_type: MetricType,

    /// Help text emitted on the `# HELP` line.
    #[serde(default)]
    pub help: String,

    /// Declared label names, in display order.
    #[serde(default)]
    pub label_names: Vec<String>,

    /// Ascending bucket upper bounds (histograms only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<f64>,
}

/// Errors that can occur during metric definition validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// Invalid label name.
    #[error("Invalid label name: '{0}'")]
    InvalidLabelName(String),

    /// A label name was declared twice.
    #[error("Duplicate label name: '{0}'")]
    DuplicateLabelName(String),

    /// Histogram has invalid buckets.
    #[error("Histogram buckets must be finite and sorted in ascending order")]
    InvalidHistogramBuckets,

    /// Buckets were declared on a counter or gauge.
    #[error("Only histograms may declare buckets")]
    UnexpectedBuckets,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricDefinition {
    /// Creates a new definition with no labels and no buckets.
    #[must_use]
    pub fn new(name: impl Into<String>, metric_type: MetricType, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metric_type,
            help: help.into(),
            label_names: Vec::new(),
            buckets: Vec::new(),
        }
    }

    /// Creates a counter definition.
    #[must_use]
    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, MetricType::Counter, help)
    }

    /// Creates a gauge definition.
    #[must_use]
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, MetricType::Gauge, help)
    }

    /// Creates a histogram definition with the given bucket bounds.
    #[must_use]
    pub fn histogram(name: impl Into<String>, help: impl Into<String>, buckets: Vec<f64>) -> Self {
        Self {
            buckets,
            ..Self::new(name, MetricType::Histogram, help)
        }
    }

    /// Sets the declared label names.
    #[must_use]
    pub fn with_label_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if `name` is one of the declared label names.
    #[must_use]
    pub fn declares_label(&self, name: &str) -> bool {
        self.label_names.iter().any(|n| n == name)
    }

    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - A label name is empty, duplicated, or the reserved `le`
    /// - Histogram buckets are not finite and strictly ascending
    /// - A counter or gauge declares buckets
    pub fn validate_definition(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }

        let mut seen = HashSet::new();
        for label in &self.label_names {
            if label.is_empty() || label == "le" {
                return Err(MetricValidationError::InvalidLabelName(label.clone()));
            }
            if !seen.insert(label.as_str()) {
                return Err(MetricValidationError::DuplicateLabelName(label.clone()));
            }
        }

        match self.metric_type {
            MetricType::Histogram => {
                if self.buckets.iter().any(|b| !b.is_finite())
                    || self.buckets.windows(2).any(|w| w[1] <= w[0])
                {
                    return Err(MetricValidationError::InvalidHistogramBuckets);
                }
            }
            MetricType::Counter | MetricType::Gauge => {
                if !self.buckets.is_empty() {
                    return Err(MetricValidationError::UnexpectedBuckets);
                }
            }
        }

        self.validate()?;
        Ok(())
    }
}
