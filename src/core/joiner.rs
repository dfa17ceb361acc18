//! Interval join between time-windowed events and a sample stream.
//!
//! Two modes are supported:
//!
//! - **Tagging** labels every sample with the identifier of the last event
//!   (in event order) whose window contains it. Confidence is not consulted.
//! - **Aggregation** computes one statistic per distinct event over the
//!   samples inside its window whose confidence meets a threshold.
//!
//! Both are pure functions of their inputs. Events flagged invalid never
//! match anything.

use crate::core::events::{first_occurrence_wins, read_events, Event, EventColumns};
use crate::core::samples::{SampleColumns, SampleView};
use crate::core::stats::Statistic;
use crate::core::table::{Column, EventId, Table};
use crate::error::{JoinError, Result};
use serde::{Deserialize, Serialize};

/// Default name of the label column added by tagging.
pub const DEFAULT_LABEL_COLUMN: &str = "event_id";

/// Counters describing one join call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSummary {
    /// Sample rows read
    pub samples: usize,
    /// Event rows read, before deduplication
    pub events: usize,
    /// Events skipped because their validity flag was false
    pub invalid_events_skipped: usize,
    /// Repeated event rows dropped (aggregation only)
    pub duplicate_events_dropped: usize,
    /// Tagging: samples that received a label. Aggregation: sample matches
    /// that passed the confidence threshold, summed over events.
    pub matched_samples: usize,
    /// In-window samples excluded for low confidence (aggregation only)
    pub low_confidence_excluded: usize,
    /// Events whose aggregate is undefined (aggregation only)
    pub undefined_aggregates: usize,
}

/// One output row of an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventAggregate {
    pub event_id: EventId,
    /// `None` when no qualifying sample carried a value
    pub value: Option<f64>,
    /// Number of in-window samples that passed the confidence threshold
    pub sample_count: usize,
}

/// Result of tagging: the sample table with a label column added.
#[derive(Debug, Clone)]
pub struct TaggedSamples {
    pub table: Table,
    pub summary: JoinSummary,
}

/// Result of aggregation: one row per distinct valid event.
#[derive(Debug, Clone)]
pub struct EventAggregates {
    /// Measurement column that was aggregated
    pub field: String,
    pub statistic: Statistic,
    pub min_confidence: f64,
    pub rows: Vec<EventAggregate>,
    pub summary: JoinSummary,
}

impl EventAggregates {
    /// Look up the aggregate for one event.
    pub fn get(&self, event_id: EventId) -> Option<&EventAggregate> {
        self.rows.iter().find(|row| row.event_id == event_id)
    }

    /// `(identifier, value)` pairs in output order.
    pub fn pairs(&self) -> Vec<(EventId, Option<f64>)> {
        self.rows.iter().map(|r| (r.event_id, r.value)).collect()
    }

    /// Two-column table of identifier and aggregate, for the sinks.
    pub fn to_table(&self) -> Result<Table> {
        let value_column = format!("{}_{}", self.field, self.statistic);
        Table::from_columns(
            "aggregates",
            vec![
                (
                    DEFAULT_LABEL_COLUMN.to_string(),
                    Column::Int(self.rows.iter().map(|r| r.event_id).collect()),
                ),
                (
                    value_column,
                    Column::Float(
                        self.rows
                            .iter()
                            .map(|r| r.value.unwrap_or(f64::NAN))
                            .collect(),
                    ),
                ),
                (
                    "sample_count".to_string(),
                    Column::Int(self.rows.iter().map(|r| r.sample_count as i64).collect()),
                ),
            ],
        )
    }
}

/// Matches event windows against sample timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalJoiner {
    pub samples: SampleColumns,
    pub events: EventColumns,
    /// Name of the label column written by tagging
    pub label_column: String,
}

impl IntervalJoiner {
    pub fn new(samples: SampleColumns, events: EventColumns) -> Self {
        Self {
            samples,
            events,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }

    /// Set the label column name used by tagging.
    pub fn with_label_column(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = label_column.into();
        self
    }

    /// Label each sample with the last containing event's identifier.
    ///
    /// Events are applied in table order and duplicates are applied again,
    /// so where windows overlap the later event overwrites the earlier
    /// label. Samples outside every valid window are labelled `None`.
    /// Tagging an already tagged table replaces the label column.
    pub fn tag_samples(&self, samples: &Table, events: &Table) -> Result<TaggedSamples> {
        let view = SampleView::for_tagging(samples, &self.samples)?;
        let events = read_events(events, &self.events)?;

        let (labels, summary) = tag(&view, &events);
        let table = samples.with_column(&self.label_column, Column::Label(labels))?;

        tracing::debug!(
            "tagged {} of {} samples from {} events ({} invalid skipped)",
            summary.matched_samples,
            summary.samples,
            summary.events,
            summary.invalid_events_skipped
        );

        Ok(TaggedSamples { table, summary })
    }

    /// Mean of `field` per event over samples with confidence at least
    /// `min_confidence`.
    ///
    /// Event durations are converted with the unit in the event column
    /// mapping; fixation exports give milliseconds.
    pub fn aggregate_by_event(
        &self,
        samples: &Table,
        events: &Table,
        field: &str,
        min_confidence: f64,
    ) -> Result<EventAggregates> {
        self.summarize_by_event(samples, events, field, min_confidence, Statistic::Mean)
    }

    /// Compute `statistic` of `field` per event.
    ///
    /// Repeated event rows are reduced with [`first_occurrence_wins`] before
    /// validity is checked, so one row is produced per distinct valid
    /// identifier, in order of first appearance.
    pub fn summarize_by_event(
        &self,
        samples: &Table,
        events: &Table,
        field: &str,
        min_confidence: f64,
        statistic: Statistic,
    ) -> Result<EventAggregates> {
        check_confidence(min_confidence)?;

        let view = SampleView::for_aggregation(samples, &self.samples)?;
        let values = samples.floats(field)?;
        let events = read_events(events, &self.events)?;

        let mut summary = JoinSummary {
            samples: view.timestamps.len(),
            events: events.len(),
            ..Default::default()
        };

        let (events, dropped) = first_occurrence_wins(&events);
        summary.duplicate_events_dropped = dropped;

        let confidence = view.confidence.as_deref().unwrap_or(&[]);
        let index = view.index();
        let mut rows = Vec::with_capacity(events.len());

        for event in &events {
            if !event.is_valid() {
                summary.invalid_events_skipped += 1;
                continue;
            }

            let mut matched = Vec::new();
            for &row in index.rows_in(&event.window()) {
                if confidence[row] >= min_confidence {
                    matched.push(values[row]);
                } else {
                    summary.low_confidence_excluded += 1;
                }
            }

            let value = statistic.compute(&matched);
            if value.is_none() {
                summary.undefined_aggregates += 1;
            }
            summary.matched_samples += matched.len();

            rows.push(EventAggregate {
                event_id: event.id,
                value,
                sample_count: matched.len(),
            });
        }

        tracing::debug!(
            "{} of '{}' over {} events: {} matches, {} low confidence, {} undefined, {} duplicates dropped",
            statistic,
            field,
            rows.len(),
            summary.matched_samples,
            summary.low_confidence_excluded,
            summary.undefined_aggregates,
            summary.duplicate_events_dropped
        );

        Ok(EventAggregates {
            field: field.to_string(),
            statistic,
            min_confidence,
            rows,
            summary,
        })
    }
}

/// Fail with `InvalidRange` unless `min_confidence` lies in [0, 1].
pub fn check_confidence(min_confidence: f64) -> Result<()> {
    if (0.0..=1.0).contains(&min_confidence) {
        Ok(())
    } else {
        Err(JoinError::InvalidRange(format!(
            "minimum confidence {min_confidence} is outside [0, 1]"
        )))
    }
}

/// Last-wins labelling over the sorted sample index.
fn tag(view: &SampleView<'_>, events: &[Event]) -> (Vec<Option<EventId>>, JoinSummary) {
    let mut labels: Vec<Option<EventId>> = vec![None; view.timestamps.len()];
    let mut summary = JoinSummary {
        samples: labels.len(),
        events: events.len(),
        ..Default::default()
    };

    let index = view.index();
    for event in events {
        if !event.is_valid() {
            summary.invalid_events_skipped += 1;
            continue;
        }
        for &row in index.rows_in(&event.window()) {
            labels[row] = Some(event.id);
        }
    }

    summary.matched_samples = labels.iter().filter(|l| l.is_some()).count();
    (labels, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::DurationUnit;

    fn joiner() -> IntervalJoiner {
        IntervalJoiner::new(
            SampleColumns {
                timestamp: "t".into(),
                confidence: "conf".into(),
            },
            EventColumns::blinks(),
        )
    }

    fn samples(t: Vec<f64>, conf: Vec<f64>, value: Vec<f64>) -> Table {
        Table::from_columns(
            "samples",
            vec![
                ("t".into(), Column::Float(t)),
                ("conf".into(), Column::Float(conf)),
                ("value".into(), Column::Float(value)),
            ],
        )
        .unwrap()
    }

    fn blinks(ids: Vec<i64>, starts: Vec<f64>, ends: Vec<f64>) -> Table {
        Table::from_columns(
            "blinks",
            vec![
                ("id".into(), Column::Int(ids)),
                ("start_timestamp".into(), Column::Float(starts)),
                ("end_timestamp".into(), Column::Float(ends)),
            ],
        )
        .unwrap()
    }

    fn labels(tagged: &TaggedSamples) -> Vec<Option<EventId>> {
        match tagged.table.column(DEFAULT_LABEL_COLUMN).unwrap() {
            Column::Label(v) => v.clone(),
            other => panic!("unexpected label column type {}", other.type_name()),
        }
    }

    #[test]
    fn test_overlapping_windows_last_wins() {
        let s = samples(vec![0.0, 1.0, 2.0, 3.0], vec![1.0; 4], vec![0.0; 4]);
        let e = blinks(vec![1, 2], vec![0.0, 1.0], vec![2.0, 3.0]);

        let tagged = joiner().tag_samples(&s, &e).unwrap();
        assert_eq!(labels(&tagged), vec![Some(1), Some(2), Some(2), Some(2)]);

        let e = blinks(vec![2, 1], vec![1.0, 0.0], vec![3.0, 2.0]);
        let tagged = joiner().tag_samples(&s, &e).unwrap();
        assert_eq!(labels(&tagged), vec![Some(1), Some(1), Some(1), Some(2)]);
    }

    #[test]
    fn test_tagging_ignores_confidence() {
        let s = samples(vec![0.5], vec![0.0], vec![1.0]);
        let e = blinks(vec![9], vec![0.0], vec![1.0]);

        let tagged = joiner().tag_samples(&s, &e).unwrap();
        assert_eq!(labels(&tagged), vec![Some(9)]);
    }

    #[test]
    fn test_empty_events_leave_all_unmatched() {
        let s = samples(vec![0.0, 1.0], vec![1.0; 2], vec![0.0; 2]);
        let e = blinks(vec![], vec![], vec![]);

        let tagged = joiner().tag_samples(&s, &e).unwrap();
        assert_eq!(labels(&tagged), vec![None, None]);
        assert_eq!(tagged.summary.matched_samples, 0);
    }

    #[test]
    fn test_empty_samples_yield_empty_output() {
        let s = samples(vec![], vec![], vec![]);
        let e = blinks(vec![1], vec![0.0], vec![1.0]);

        let tagged = joiner().tag_samples(&s, &e).unwrap();
        assert!(tagged.table.is_empty());

        let aggregates = joiner().aggregate_by_event(&s, &e, "value", 0.5).unwrap();
        assert_eq!(aggregates.pairs(), vec![(1, None)]);
    }

    #[test]
    fn test_custom_label_column() {
        let s = samples(vec![0.0], vec![1.0], vec![0.0]);
        let e = blinks(vec![3], vec![0.0], vec![0.0]);

        let tagged = joiner()
            .with_label_column("blink_id")
            .tag_samples(&s, &e)
            .unwrap();
        assert!(tagged.table.has_column("blink_id"));
        assert!(!tagged.table.has_column(DEFAULT_LABEL_COLUMN));
    }

    #[test]
    fn test_confidence_out_of_range() {
        let s = samples(vec![0.0], vec![1.0], vec![0.0]);
        let e = blinks(vec![1], vec![0.0], vec![1.0]);

        for bad in [-0.1, 1.01, f64::NAN] {
            let err = joiner().aggregate_by_event(&s, &e, "value", bad).unwrap_err();
            assert!(matches!(err, JoinError::InvalidRange(_)));
        }
    }

    #[test]
    fn test_missing_measurement_field() {
        let s = samples(vec![0.0], vec![1.0], vec![0.0]);
        let e = blinks(vec![1], vec![0.0], vec![1.0]);

        let err = joiner()
            .aggregate_by_event(&s, &e, "diameter_3d", 0.5)
            .unwrap_err();
        assert!(matches!(err, JoinError::InvalidSchema(_)));
    }

    #[test]
    fn test_summary_counts() {
        let s = samples(
            vec![0.0, 0.5, 1.0, 10.0],
            vec![0.9, 0.1, 0.9, 0.9],
            vec![1.0, 2.0, 3.0, 4.0],
        );
        let e = blinks(vec![1, 1, 2], vec![0.0, 0.0, 5.0], vec![1.0, 1.0, 6.0]);

        let aggregates = joiner().aggregate_by_event(&s, &e, "value", 0.5).unwrap();
        assert_eq!(aggregates.pairs(), vec![(1, Some(2.0)), (2, None)]);
        assert_eq!(
            aggregates.summary,
            JoinSummary {
                samples: 4,
                events: 3,
                invalid_events_skipped: 0,
                duplicate_events_dropped: 1,
                matched_samples: 2,
                low_confidence_excluded: 1,
                undefined_aggregates: 1,
            }
        );
    }

    #[test]
    fn test_duration_mapping_used_for_windows() {
        let s = samples(vec![10.0, 10.4, 10.6], vec![1.0; 3], vec![1.0, 3.0, 100.0]);
        let e = Table::from_columns(
            "fixations",
            vec![
                ("id".into(), Column::Int(vec![5])),
                ("start_timestamp".into(), Column::Float(vec![10.0])),
                ("duration".into(), Column::Float(vec![500.0])),
            ],
        )
        .unwrap();

        let mut j = joiner();
        j.events = EventColumns::fixations();
        let aggregates = j.aggregate_by_event(&s, &e, "value", 0.0).unwrap();
        assert_eq!(aggregates.pairs(), vec![(5, Some(2.0))]);

        j.events.end = crate::core::events::EndColumn::Duration {
            column: "duration".into(),
            unit: DurationUnit::Seconds,
        };
        let aggregates = j.aggregate_by_event(&s, &e, "value", 0.0).unwrap();
        let mean = aggregates.get(5).and_then(|row| row.value).unwrap();
        assert!((mean - 104.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_table_shape() {
        let s = samples(vec![0.0], vec![1.0], vec![4.0]);
        let e = blinks(vec![1, 2], vec![0.0, 5.0], vec![1.0, 6.0]);

        let table = joiner()
            .summarize_by_event(&s, &e, "value", 0.0, Statistic::Max)
            .unwrap()
            .to_table()
            .unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["event_id", "value_max", "sample_count"]);
        assert_eq!(table.column("value_max").unwrap().cell(1), "");
    }
}
