//! Log-derived aggregation.
//!
//! The `AggregationEngine` replays the complete event log on every refresh and
//! computes an `AggregateSnapshot` from scratch. No state is carried between
//! snapshots apart from the engine's start time.

mod engine;
pub mod snapshot;

pub use engine::AggregationEngine;
pub use snapshot::{
    AggregateSnapshot, AuthStats, DatabaseStats, ErrorStats, HttpStats, OrderStats,
    StatusCodeCounts,
};
