//! Pulsewatch Shared Library
//!
//! This crate contains the in-process metrics registry, the append-only
//! metrics event log and the aggregation engine that derives dashboard
//! statistics from that log.
//!
//! # Modules
//!
//! - [`models`] - Metric definitions, label sets and log records
//! - [`registry`] - Metric registry and text exposition
//! - [`storage`] - Event log trait and implementations
//! - [`recorder`] - Producer-side helpers writing records to the event log
//! - [`aggregation`] - Log-derived statistics
//! - [`config`] - Aggregation settings
//!
//! # Example
//!
//! ```
//! use shared::models::{LabelSet, MetricDefinition};
//! use shared::registry::MetricRegistry;
//!
//! let registry = MetricRegistry::new("user-service");
//! registry
//!     .register(MetricDefinition::counter("logins_total", "Login attempts").with_label_names(["result"]))
//!     .unwrap();
//! registry
//!     .increment_counter("logins_total", &LabelSet::from([("result", "success")]), 1.0)
//!     .unwrap();
//!
//! let text = registry.export().unwrap();
//! assert!(text.contains("logins_total_user-service{result=\"success\"} 1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregation;
pub mod config;
pub mod models;
pub mod recorder;
pub mod registry;
pub mod storage;

pub use recorder::MetricsRecorder;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
