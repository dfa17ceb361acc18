//! Core functionality for gazejoin.
//!
//! This module contains:
//! - Columnar tables and row filtering
//! - Event and sample views over those tables
//! - The interval joiner that tags samples and aggregates per event

pub mod events;
pub mod joiner;
pub mod samples;
pub mod stats;
pub mod table;

// Re-export commonly used types
pub use events::{
    first_occurrence_wins, read_events, DurationUnit, EndColumn, Event, EventColumns, EventEnd,
    Window,
};
pub use joiner::{
    check_confidence, EventAggregate, EventAggregates, IntervalJoiner, JoinSummary,
    TaggedSamples, DEFAULT_LABEL_COLUMN,
};
pub use samples::{SampleColumns, SampleView, SortedIndex};
pub use stats::Statistic;
pub use table::{Column, EventId, RowFilter, Table};
