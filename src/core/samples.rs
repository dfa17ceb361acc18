//! High-frequency sample streams (gaze and pupil positions).

use crate::core::events::Window;
use crate::core::table::Table;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Column mapping for a sample table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleColumns {
    /// Timestamp column, in seconds
    pub timestamp: String,
    /// Confidence column, in [0, 1]
    pub confidence: String,
}

impl SampleColumns {
    /// Pupil position export.
    pub fn pupil_positions() -> Self {
        Self {
            timestamp: "pupil_timestamp".to_string(),
            confidence: "confidence".to_string(),
        }
    }

    /// Gaze position export.
    pub fn gaze_positions() -> Self {
        Self {
            timestamp: "gaze_timestamp".to_string(),
            confidence: "confidence".to_string(),
        }
    }
}

/// Timestamp-ordered index over a sample stream.
///
/// Samples only need to be roughly ordered; the index sorts row positions by
/// timestamp once so each event window resolves to a contiguous slice with
/// two binary searches. NaN timestamps are left out and match nothing.
#[derive(Debug, Clone)]
pub struct SortedIndex {
    rows: Vec<usize>,
    timestamps: Vec<f64>,
    out_of_order: usize,
}

impl SortedIndex {
    pub fn new(timestamps: &[f64]) -> Self {
        let out_of_order = timestamps.windows(2).filter(|pair| pair[1] < pair[0]).count();

        let mut rows: Vec<usize> = (0..timestamps.len())
            .filter(|&i| !timestamps[i].is_nan())
            .collect();
        // Stable, so equal timestamps keep their original row order.
        rows.sort_by(|&a, &b| timestamps[a].total_cmp(&timestamps[b]));

        let sorted = rows.iter().map(|&i| timestamps[i]).collect();

        Self {
            rows,
            timestamps: sorted,
            out_of_order,
        }
    }

    /// Row positions whose timestamp lies in `window`, in timestamp order.
    pub fn rows_in(&self, window: &Window) -> &[usize] {
        if !window.is_matchable() {
            return &[];
        }
        let lo = self.timestamps.partition_point(|&t| t < window.start);
        let hi = self.timestamps.partition_point(|&t| t <= window.end);
        if hi <= lo {
            &[]
        } else {
            &self.rows[lo..hi]
        }
    }

    /// Number of indexed (non-NaN) samples.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of adjacent pairs in the input that went backwards in time.
    pub fn out_of_order(&self) -> usize {
        self.out_of_order
    }
}

/// Typed view over the columns of a sample table the joiner needs.
#[derive(Debug)]
pub struct SampleView<'a> {
    pub timestamps: Cow<'a, [f64]>,
    pub confidence: Option<Cow<'a, [f64]>>,
}

impl<'a> SampleView<'a> {
    /// Timestamps only, for tagging.
    pub fn for_tagging(table: &'a Table, columns: &SampleColumns) -> Result<Self> {
        Ok(Self {
            timestamps: table.floats(&columns.timestamp)?,
            confidence: None,
        })
    }

    /// Timestamps and confidence, for aggregation.
    pub fn for_aggregation(table: &'a Table, columns: &SampleColumns) -> Result<Self> {
        Ok(Self {
            timestamps: table.floats(&columns.timestamp)?,
            confidence: Some(table.floats(&columns.confidence)?),
        })
    }

    /// Build the timestamp index, logging if the stream was not ordered.
    pub fn index(&self) -> SortedIndex {
        let index = SortedIndex::new(&self.timestamps);
        if index.out_of_order() > 0 {
            tracing::debug!(
                "sample timestamps went backwards {} time(s); using sorted index",
                index.out_of_order()
            );
        }
        index
    }
}
