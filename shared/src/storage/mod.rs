//! Storage traits and implementations.
//!
//! This module provides the append-only event log that producers write metric
//! records to and the aggregation engine replays. The `EventLog` trait allows
//! different implementations (file-backed, in-memory).

pub mod event_log;

pub use event_log::{EventLog, EventLogError, FileEventLog, InMemoryEventLog, Records};
