//! Per-event summary statistics.

use crate::error::JoinError;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::fmt;
use std::str::FromStr;

/// Statistic computed over the measurement values matched to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    #[default]
    Mean,
    Count,
    Median,
    Min,
    Max,
    /// Sample standard deviation (n - 1)
    StdDev,
}

impl Statistic {
    pub const ALL: [Statistic; 6] = [
        Statistic::Mean,
        Statistic::Count,
        Statistic::Median,
        Statistic::Min,
        Statistic::Max,
        Statistic::StdDev,
    ];

    /// Compute the statistic, ignoring NaN (missing) values.
    ///
    /// Returns `None` when the statistic is undefined for the remaining
    /// values, which is every statistic but `Count` on an empty match and
    /// `StdDev` on a single value. `None` is never reported as `0.0`.
    pub fn compute(self, values: &[f64]) -> Option<f64> {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();

        let value = match self {
            Statistic::Count => return Some(present.len() as f64),
            _ if present.is_empty() => return None,
            Statistic::Mean => Statistics::mean(present.iter()),
            Statistic::Median => Data::new(present).median(),
            Statistic::Min => Statistics::min(present.iter()),
            Statistic::Max => Statistics::max(present.iter()),
            Statistic::StdDev => Statistics::std_dev(present.iter()),
        };

        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Count => "count",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::StdDev => "std_dev",
        }
    }
}

impl FromStr for Statistic {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.as_str() == s || (s == "std" && *stat == Statistic::StdDev))
            .ok_or_else(|| {
                JoinError::InvalidRange(format!(
                    "unknown statistic '{s}' (expected mean, count, median, min, max or std_dev)"
                ))
            })
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
