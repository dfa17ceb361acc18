//! gazejoin - interval joins over eye-tracking exports.
//!
//! Matches time-windowed events (fixations, blinks, surface fixations)
//! against high-frequency sample streams (gaze and pupil positions).
//!
//! # Modes
//!
//! - **Tagging**: label each sample with the identifier of the last event
//!   whose closed `[start, end]` window contains it.
//! - **Aggregation**: one statistic per distinct valid event over the
//!   in-window samples whose confidence meets a threshold.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          gazejoin                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Loader    │──▶│   Joiner    │──▶│   Export    │        │
//! │  │   (CSV)     │   │ (tag / agg) │   │ (CSV/JSON)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │ JoinSummary │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gazejoin::{config::Preset, loader};
//! use std::path::Path;
//!
//! let pupil = loader::load_csv(Path::new("pupil_positions.csv")).unwrap();
//! let fixations = loader::load_csv(Path::new("fixations.csv")).unwrap();
//!
//! // Fixation durations are milliseconds; the preset converts them.
//! let joiner = Preset::PupilFixations.joiner();
//! let result = joiner
//!     .aggregate_by_event(&pupil, &fixations, "diameter_3d", 0.8)
//!     .unwrap();
//!
//! for (id, mean) in result.pairs() {
//!     println!("{id}: {mean:?}");
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod loader;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, Preset};
pub use self::core::{
    Column, DurationUnit, Event, EventAggregate, EventAggregates, EventColumns, EventId,
    IntervalJoiner, JoinSummary, RowFilter, SampleColumns, Statistic, Table, TaggedSamples,
    Window,
};
pub use error::{JoinError, Result};
pub use export::{OutputFormat, ReportBuilder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
