//! Configuration module for Pulsewatch.
//!
//! This module contains the settings of the log-derived aggregation engine.

pub mod aggregation;

pub use aggregation::{AggregationConfig, AggregationConfigError};
