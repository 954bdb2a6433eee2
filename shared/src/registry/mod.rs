//! In-process metric registry.
//!
//! A [`MetricRegistry`] owns a set of [`MetricDefinition`]s and the series
//! accumulated under each of them. Series are keyed by the canonical form of
//! their [`LabelSet`], created lazily on first mutation, and never removed.
//!
//! All mutations and reads go through a single `RwLock`, so label-keyed
//! read-modify-write sequences are serialized per registry.

mod exposition;
pub mod service;

pub use service::ServiceMetrics;

use crate::models::{HistogramData, LabelSet, MetricDefinition, MetricType, MetricValidationError};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A metric with this name is already registered.
    #[error("Metric '{0}' is already registered")]
    DuplicateMetric(String),

    /// The metric is not registered, or is registered with another type.
    #[error("Unknown {expected} metric '{name}'")]
    UnknownMetric {
        /// The requested metric name.
        name: String,
        /// The type the operation requires.
        expected: MetricType,
    },

    /// The label set names a label the metric does not declare.
    #[error("Label '{label}' is not declared by metric '{metric}'")]
    InvalidLabelSet {
        /// The metric name.
        metric: String,
        /// The undeclared label name.
        label: String,
    },

    /// The value cannot be applied to the metric.
    #[error("Invalid value {value} for metric '{metric}': {reason}")]
    InvalidValue {
        /// The metric name.
        metric: String,
        /// The rejected value.
        value: f64,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// The definition failed validation.
    #[error("Invalid metric definition: {0}")]
    InvalidDefinition(#[from] MetricValidationError),

    /// Failed to acquire lock on the registry.
    #[error("Failed to acquire lock on metric registry")]
    LockError,
}

/// Handle returned by [`MetricRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricHandle {
    name: String,
    metric_type: MetricType,
}

impl MetricHandle {
    /// The registered metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registered metric type.
    #[must_use]
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SeriesValue {
    Scalar(f64),
    Samples(Vec<f64>),
}

#[derive(Debug)]
struct Series {
    labels: LabelSet,
    value: SeriesValue,
}

#[derive(Debug)]
struct Family {
    definition: MetricDefinition,
    series: Vec<Series>,
    index: HashMap<String, usize>,
}

impl Family {
    fn new(definition: MetricDefinition) -> Self {
        Self {
            definition,
            series: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn find(&self, labels: &LabelSet) -> Option<&Series> {
        self.index
            .get(&labels.canonical_key())
            .map(|&i| &self.series[i])
    }

    fn series_mut(&mut self, labels: &LabelSet) -> &mut Series {
        let key = labels.canonical_key();
        let i = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let value = match self.definition.metric_type {
                    MetricType::Histogram => SeriesValue::Samples(Vec::new()),
                    MetricType::Counter | MetricType::Gauge => SeriesValue::Scalar(0.0),
                };
                self.series.push(Series {
                    labels: labels.clone(),
                    value,
                });
                self.index.insert(key, self.series.len() - 1);
                self.series.len() - 1
            }
        };
        &mut self.series[i]
    }
}

#[derive(Debug, Default)]
struct Inner {
    families: Vec<Family>,
    by_name: HashMap<String, usize>,
}

impl Inner {
    fn family(&self, name: &str, expected: MetricType) -> Result<&Family, RegistryError> {
        self.by_name
            .get(name)
            .map(|&i| &self.families[i])
            .filter(|f| f.definition.metric_type == expected)
            .ok_or_else(|| RegistryError::UnknownMetric {
                name: name.to_string(),
                expected,
            })
    }

    fn family_mut(&mut self, name: &str, expected: MetricType) -> Result<&mut Family, RegistryError> {
        let i = self.family(name, expected).map(|_| self.by_name[name])?;
        Ok(&mut self.families[i])
    }
}

/// A registry of typed metrics and their label-keyed series.
///
/// # Example
///
/// ```
/// use shared::models::{LabelSet, MetricDefinition};
/// use shared::registry::MetricRegistry;
///
/// let registry = MetricRegistry::new("user-service");
/// registry
///     .register(MetricDefinition::counter("logins_total", "Total logins").with_label_names(["result"]))
///     .unwrap();
///
/// let labels = LabelSet::new().with_label("result", "success");
/// registry.increment_counter("logins_total", &labels, 1.0).unwrap();
/// registry.increment_counter("logins_total", &labels, 2.0).unwrap();
///
/// assert_eq!(registry.counter_value("logins_total", &labels).unwrap(), Some(3.0));
/// assert!(registry.export().unwrap().contains("logins_total_user-service{result=\"success\"} 3"));
/// ```
#[derive(Debug)]
pub struct MetricRegistry {
    service: String,
    inner: RwLock<Inner>,
}

impl MetricRegistry {
    /// Creates an empty registry whose exported names carry the `service` suffix.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The service suffix used in exported metric names.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, RegistryError> {
        self.inner.read().map_err(|_| RegistryError::LockError)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, RegistryError> {
        self.inner.write().map_err(|_| RegistryError::LockError)
    }

    /// Registers a metric definition.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The definition fails validation
    /// - A metric with the same name is already registered
    pub fn register(&self, definition: MetricDefinition) -> Result<MetricHandle, RegistryError> {
        definition.validate_definition()?;

        let mut inner = self.write()?;
        if inner.by_name.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateMetric(definition.name));
        }

        let handle = MetricHandle {
            name: definition.name.clone(),
            metric_type: definition.metric_type,
        };
        let index = inner.families.len();
        inner.by_name.insert(definition.name.clone(), index);
        inner.families.push(Family::new(definition));

        tracing::debug!(
            metric = %handle.name,
            metric_type = %handle.metric_type,
            service = %self.service,
            "Metric registered"
        );
        Ok(handle)
    }

    /// Adds `delta` to a counter series.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The metric is not a registered counter
    /// - `labels` names an undeclared label
    /// - `delta` is negative or not finite
    pub fn increment_counter(
        &self,
        name: &str,
        labels: &LabelSet,
        delta: f64,
    ) -> Result<(), RegistryError> {
        check_finite(name, delta)?;
        if delta < 0.0 {
            return Err(RegistryError::InvalidValue {
                metric: name.to_string(),
                value: delta,
                reason: "counters cannot decrease",
            });
        }
        self.mutate(name, MetricType::Counter, labels, |value| {
            if let SeriesValue::Scalar(v) = value {
                *v += delta;
            }
        })
    }

    /// Adds one to a counter series.
    ///
    /// # Errors
    ///
    /// Same as [`MetricRegistry::increment_counter`].
    pub fn increment_counter_by_one(&self, name: &str, labels: &LabelSet) -> Result<(), RegistryError> {
        self.increment_counter(name, labels, 1.0)
    }

    /// Overwrites a gauge series.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The metric is not a registered gauge
    /// - `labels` names an undeclared label
    /// - `value` is not finite
    pub fn set_gauge(&self, name: &str, labels: &LabelSet, value: f64) -> Result<(), RegistryError> {
        check_finite(name, value)?;
        self.mutate(name, MetricType::Gauge, labels, |current| {
            *current = SeriesValue::Scalar(value);
        })
    }

    /// Adds `delta` (which may be negative) to a gauge series under one lock.
    ///
    /// # Errors
    ///
    /// Same as [`MetricRegistry::set_gauge`].
    pub fn add_gauge(&self, name: &str, labels: &LabelSet, delta: f64) -> Result<(), RegistryError> {
        check_finite(name, delta)?;
        self.mutate(name, MetricType::Gauge, labels, |value| {
            if let SeriesValue::Scalar(v) = value {
                *v += delta;
            }
        })
    }

    /// Appends a sample to a histogram series.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The metric is not a registered histogram
    /// - `labels` names an undeclared label
    /// - `value` is not finite
    pub fn observe_histogram(
        &self,
        name: &str,
        labels: &LabelSet,
        value: f64,
    ) -> Result<(), RegistryError> {
        check_finite(name, value)?;
        self.mutate(name, MetricType::Histogram, labels, |samples| {
            if let SeriesValue::Samples(s) = samples {
                s.push(value);
            }
        })
    }

    fn mutate(
        &self,
        name: &str,
        expected: MetricType,
        labels: &LabelSet,
        apply: impl FnOnce(&mut SeriesValue),
    ) -> Result<(), RegistryError> {
        let mut inner = self.write()?;
        let family = inner.family_mut(name, expected)?;

        if let Some(label) = labels.names().find(|l| !family.definition.declares_label(l)) {
            return Err(RegistryError::InvalidLabelSet {
                metric: name.to_string(),
                label: label.to_string(),
            });
        }

        apply(&mut family.series_mut(labels).value);
        Ok(())
    }

    /// Renders every registered metric in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn export(&self) -> Result<String, RegistryError> {
        let inner = self.read()?;
        Ok(exposition::render(&self.service, &inner.families))
    }

    /// Returns a copy of the definition registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn definition(&self, name: &str) -> Result<Option<MetricDefinition>, RegistryError> {
        let inner = self.read()?;
        Ok(inner
            .by_name
            .get(name)
            .map(|&i| inner.families[i].definition.clone()))
    }

    /// Returns the current value of a counter series, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is not a registered counter.
    pub fn counter_value(&self, name: &str, labels: &LabelSet) -> Result<Option<f64>, RegistryError> {
        self.scalar_value(name, MetricType::Counter, labels)
    }

    /// Returns the current value of a gauge series, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is not a registered gauge.
    pub fn gauge_value(&self, name: &str, labels: &LabelSet) -> Result<Option<f64>, RegistryError> {
        self.scalar_value(name, MetricType::Gauge, labels)
    }

    fn scalar_value(
        &self,
        name: &str,
        expected: MetricType,
        labels: &LabelSet,
    ) -> Result<Option<f64>, RegistryError> {
        let inner = self.read()?;
        let family = inner.family(name, expected)?;
        Ok(family.find(labels).and_then(|s| match s.value {
            SeriesValue::Scalar(v) => Some(v),
            SeriesValue::Samples(_) => None,
        }))
    }

    /// Returns the derived cumulative buckets of a histogram series, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric is not a registered histogram.
    pub fn histogram_data(
        &self,
        name: &str,
        labels: &LabelSet,
    ) -> Result<Option<HistogramData>, RegistryError> {
        let inner = self.read()?;
        let family = inner.family(name, MetricType::Histogram)?;
        Ok(family.find(labels).and_then(|s| match &s.value {
            SeriesValue::Samples(samples) => Some(HistogramData::from_samples(
                &family.definition.buckets,
                samples,
            )),
            SeriesValue::Scalar(_) => None,
        }))
    }

    /// Returns the number of series accumulated under `name` (0 if unregistered).
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn series_count(&self, name: &str) -> Result<usize, RegistryError> {
        let inner = self.read()?;
        Ok(inner
            .by_name
            .get(name)
            .map_or(0, |&i| inner.families[i].series.len()))
    }

    /// Returns the number of registered metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn metric_count(&self) -> Result<usize, RegistryError> {
        Ok(self.read()?.families.len())
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), RegistryError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RegistryError::InvalidValue {
            metric: name.to_string(),
            value,
            reason: "value must be a finite number",
        })
    }
}
