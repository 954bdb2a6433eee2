//! Data models for the Pulsewatch metrics subsystem.
//!
//! This module contains metric definitions, label sets, and the event log record.

pub mod labels;
pub mod metric;
pub mod record;

pub use labels::LabelSet;
pub use metric::{
    HistogramBucket, HistogramData, MetricDefinition, MetricType, MetricValidationError,
};
pub use record::{LogRecord, RecordValidationError};
