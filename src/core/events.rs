//! Time-windowed events (fixations, blinks, surface fixations).
//!
//! Events are read out of an event [`Table`] through an [`EventColumns`]
//! mapping. Each event covers a closed [`Window`] in seconds, given either
//! by an explicit end timestamp or by a start plus a duration.

use crate::core::table::{EventId, Table};
use crate::error::{JoinError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Unit of an event duration column.
///
/// Timestamps are always seconds. Fixation exports record durations in
/// milliseconds, which is why that is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    #[default]
    Milliseconds,
    Seconds,
}

impl DurationUnit {
    /// Convert a duration in this unit to seconds.
    pub fn to_seconds(self, duration: f64) -> f64 {
        match self {
            DurationUnit::Milliseconds => duration / 1000.0,
            DurationUnit::Seconds => duration,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(DurationUnit::Milliseconds),
            "s" | "sec" | "secs" | "seconds" => Ok(DurationUnit::Seconds),
            other => Err(JoinError::InvalidRange(format!(
                "unknown duration unit '{other}' (expected ms or s)"
            ))),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUnit::Milliseconds => write!(f, "ms"),
            DurationUnit::Seconds => write!(f, "s"),
        }
    }
}

/// A closed time interval `[start, end]` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether any timestamp can fall inside. False when either bound is NaN
    /// or the window ends before it starts.
    pub fn is_matchable(&self) -> bool {
        self.start <= self.end
    }

    /// Check if a timestamp falls within this window. Both bounds are inclusive.
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Length of the window in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }
}

/// How an event's end is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventEnd {
    /// Explicit end timestamp in seconds
    At(f64),
    /// Duration after the start, in the given unit
    After { duration: f64, unit: DurationUnit },
}

/// A discrete time-windowed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    /// Start timestamp in seconds
    pub start: f64,
    pub end: EventEnd,
    /// Validity flag (e.g. "on surface"); `None` when the source has none
    pub valid: Option<bool>,
}

impl Event {
    /// Create an event with an explicit end timestamp.
    pub fn with_end(id: EventId, start: f64, end: f64) -> Self {
        Self {
            id,
            start,
            end: EventEnd::At(end),
            valid: None,
        }
    }

    /// Create an event from a start timestamp and a duration.
    pub fn with_duration(id: EventId, start: f64, duration: f64, unit: DurationUnit) -> Self {
        Self {
            id,
            start,
            end: EventEnd::After { duration, unit },
            valid: None,
        }
    }

    /// Attach a validity flag.
    pub fn validity(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    /// Events without a validity flag count as valid.
    pub fn is_valid(&self) -> bool {
        self.valid != Some(false)
    }

    /// The closed window this event covers, in seconds.
    pub fn window(&self) -> Window {
        let end = match self.end {
            EventEnd::At(end) => end,
            EventEnd::After { duration, unit } => self.start + unit.to_seconds(duration),
        };
        Window::new(self.start, end)
    }
}

/// Where the event end comes from in an event table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndColumn {
    /// End timestamp column, in seconds
    Timestamp { column: String },
    /// Duration column in `unit`, added to the start
    Duration { column: String, unit: DurationUnit },
}

/// Column mapping for an event table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventColumns {
    pub id: String,
    pub start: String,
    pub end: EndColumn,
    /// Optional boolean column; rows where it is false are never matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<String>,
}

impl EventColumns {
    /// Fixation export: `id`, `start_timestamp`, `duration` in milliseconds.
    pub fn fixations() -> Self {
        Self {
            id: "id".to_string(),
            start: "start_timestamp".to_string(),
            end: EndColumn::Duration {
                column: "duration".to_string(),
                unit: DurationUnit::Milliseconds,
            },
            validity: None,
        }
    }

    /// Blink export: `id`, `start_timestamp`, `end_timestamp`.
    pub fn blinks() -> Self {
        Self {
            id: "id".to_string(),
            start: "start_timestamp".to_string(),
            end: EndColumn::Timestamp {
                column: "end_timestamp".to_string(),
            },
            validity: None,
        }
    }

    /// Surface-mapped fixations: one row per world frame, keyed by
    /// `fixation_id`, with an `on_surf` validity flag.
    pub fn surface_fixations() -> Self {
        Self {
            id: "fixation_id".to_string(),
            start: "start_timestamp".to_string(),
            end: EndColumn::Duration {
                column: "duration".to_string(),
                unit: DurationUnit::Milliseconds,
            },
            validity: Some("on_surf".to_string()),
        }
    }
}

/// Read typed events out of an event table.
///
/// Fails with `InvalidSchema` if any mapped column is missing or has the
/// wrong type. Row order is preserved and duplicates are kept.
pub fn read_events(table: &Table, columns: &EventColumns) -> Result<Vec<Event>> {
    let ids = table.ints(&columns.id)?;
    let starts = table.floats(&columns.start)?;
    let validity = match &columns.validity {
        Some(name) => Some(table.bools(name)?),
        None => None,
    };

    let events: Vec<Event> = match &columns.end {
        EndColumn::Timestamp { column } => {
            let ends = table.floats(column)?;
            (0..table.len())
                .map(|i| Event::with_end(ids[i], starts[i], ends[i]))
                .collect()
        }
        EndColumn::Duration { column, unit } => {
            let durations = table.floats(column)?;
            (0..table.len())
                .map(|i| Event::with_duration(ids[i], starts[i], durations[i], *unit))
                .collect()
        }
    };

    let events: Vec<Event> = match validity {
        Some(flags) => events
            .into_iter()
            .zip(flags.iter())
            .map(|(event, &valid)| event.validity(valid))
            .collect(),
        None => events,
    };

    let unmatchable = events
        .iter()
        .filter(|e| !e.window().is_matchable())
        .count();
    if unmatchable > 0 {
        tracing::warn!(
            "{} table has {} event(s) with a NaN or inverted window; they match nothing",
            table.name(),
            unmatchable
        );
    }

    Ok(events)
}

/// Keep only the first row for each event identifier.
///
/// Surface exports repeat a fixation once per world frame it spans, so one
/// logical event can appear many times. Only the first row's boundaries and
/// validity are authoritative; later rows are dropped even when their
/// boundaries differ. Returns the retained events in order of first
/// appearance and the number of rows dropped.
pub fn first_occurrence_wins(events: &[Event]) -> (Vec<Event>, usize) {
    let mut seen: HashSet<EventId> = HashSet::with_capacity(events.len());
    let kept: Vec<Event> = events
        .iter()
        .filter(|e| seen.insert(e.id))
        .cloned()
        .collect();
    let dropped = events.len() - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Column;

    #[test]
    fn test_window_bounds_inclusive() {
        let window = Window::new(1.0, 2.0);
        assert!(window.contains(1.0));
        assert!(window.contains(1.5));
        assert!(window.contains(2.0));
        assert!(!window.contains(0.999));
        assert!(!window.contains(2.001));
    }

    #[test]
    fn test_nan_or_inverted_window_not_matchable() {
        assert!(Window::new(1.0, 1.0).is_matchable());
        assert!(!Window::new(2.0, 1.0).is_matchable());
        assert!(!Window::new(f64::NAN, 1.0).is_matchable());
        assert!(!Window::new(1.0, f64::NAN).is_matchable());
    }

    #[test]
    fn test_duration_in_milliseconds_converted() {
        let event = Event::with_duration(3, 10.0, 500.0, DurationUnit::Milliseconds);
        assert_eq!(event.window(), Window::new(10.0, 10.5));

        let event = Event::with_duration(3, 10.0, 0.5, DurationUnit::Seconds);
        assert_eq!(event.window(), Window::new(10.0, 10.5));
    }

    #[test]
    fn test_unflagged_event_is_valid() {
        assert!(Event::with_end(1, 0.0, 1.0).is_valid());
        assert!(Event::with_end(1, 0.0, 1.0).validity(true).is_valid());
        assert!(!Event::with_end(1, 0.0, 1.0).validity(false).is_valid());
    }

    #[test]
    fn test_duration_unit_parsing() {
        assert_eq!("ms".parse::<DurationUnit>().unwrap(), DurationUnit::Milliseconds);
        assert_eq!("Seconds".parse::<DurationUnit>().unwrap(), DurationUnit::Seconds);
        assert!("minutes".parse::<DurationUnit>().is_err());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let events = vec![
            Event::with_duration(7, 1.0, 100.0, DurationUnit::Milliseconds),
            Event::with_duration(8, 2.0, 100.0, DurationUnit::Milliseconds),
            Event::with_duration(7, 5.0, 900.0, DurationUnit::Milliseconds),
        ];

        let (kept, dropped) = first_occurrence_wins(&events);
        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, 7);
        assert_eq!(kept[0].start, 1.0);
        assert_eq!(kept[1].id, 8);
    }

    #[test]
    fn test_read_surface_events() {
        let table = Table::from_columns(
            "fixations_on_surface",
            vec![
                ("fixation_id".into(), Column::Int(vec![4, 4, 9])),
                ("start_timestamp".into(), Column::Float(vec![1.0, 1.0, 3.0])),
                ("duration".into(), Column::Float(vec![250.0, 250.0, 100.0])),
                ("on_surf".into(), Column::Bool(vec![true, true, false])),
            ],
        )
        .unwrap();

        let events = read_events(&table, &EventColumns::surface_fixations()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].window(), Window::new(1.0, 1.25));
        assert!(events[0].is_valid());
        assert!(!events[2].is_valid());
    }

    #[test]
    fn test_read_events_requires_end_column() {
        let table = Table::from_columns(
            "blinks",
            vec![
                ("id".into(), Column::Int(vec![1])),
                ("start_timestamp".into(), Column::Float(vec![1.0])),
            ],
        )
        .unwrap();

        let err = read_events(&table, &EventColumns::blinks()).unwrap_err();
        assert!(matches!(err, JoinError::InvalidSchema(_)));
        assert!(err.to_string().contains("end_timestamp"));
    }

    #[test]
    fn test_mapped_validity_column_must_exist() {
        let table = Table::from_columns(
            "fixations",
            vec![
                ("fixation_id".into(), Column::Int(vec![1])),
                ("start_timestamp".into(), Column::Float(vec![1.0])),
                ("duration".into(), Column::Float(vec![10.0])),
            ],
        )
        .unwrap();

        assert!(matches!(
            read_events(&table, &EventColumns::surface_fixations()),
            Err(JoinError::InvalidSchema(_))
        ));
    }
}
