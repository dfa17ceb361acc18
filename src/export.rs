//! Output sinks for tagged tables and per-event aggregates.
//!
//! Tagged sample tables are written as CSV. Aggregates can be written as
//! CSV, a pretty JSON report with provenance, or JSON Lines.

use crate::core::joiner::{EventAggregate, EventAggregates, JoinSummary};
use crate::core::stats::Statistic;
use crate::core::table::Table;
use crate::error::{JoinError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "gazejoin";

/// Aggregate output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Jsonl,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            other => Err(JoinError::InvalidRange(format!(
                "unknown output format '{other}' (expected csv, json or jsonl)"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Producer metadata attached to JSON reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    /// Unique identifier of the run that produced the report
    pub run_id: String,
}

/// JSON report wrapping the aggregates of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub producer: Producer,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub field: String,
    pub statistic: Statistic,
    pub min_confidence: f64,
    pub summary: JoinSummary,
    pub aggregates: Vec<EventAggregate>,
}

/// Builds reports that share one run identifier.
pub struct ReportBuilder {
    run_id: Uuid,
}

impl ReportBuilder {
    /// Create a builder with a fresh run ID.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn build(&self, aggregates: &EventAggregates) -> AggregateReport {
        AggregateReport {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                run_id: self.run_id.to_string(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            field: aggregates.field.clone(),
            statistic: aggregates.statistic,
            min_confidence: aggregates.min_confidence,
            summary: aggregates.summary,
            aggregates: aggregates.rows.clone(),
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a table as CSV with a header row.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let columns: Vec<_> = table.columns().collect();
    csv_writer.write_record(columns.iter().map(|(name, _)| *name))?;

    for row in 0..table.len() {
        csv_writer.write_record(columns.iter().map(|(_, column)| column.cell(row)))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write aggregates in the given format.
pub fn write_aggregates<W: Write>(
    aggregates: &EventAggregates,
    format: OutputFormat,
    builder: &ReportBuilder,
    mut writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(&aggregates.to_table()?, writer),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &builder.build(aggregates))?;
            writeln!(writer)?;
            writer.flush()?;
            Ok(())
        }
        OutputFormat::Jsonl => {
            for row in &aggregates.rows {
                serde_json::to_writer(&mut writer, row)?;
                writeln!(writer)?;
            }
            writer.flush()?;
            Ok(())
        }
    }
}

/// Create `path`'s parent directory and open it for writing, or return
/// stdout when `path` is `-`.
pub fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdout().lock()));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    tracing::info!("writing {:?}", path);
    Ok(Box::new(io::BufWriter::new(file)))
}

/// Timestamped file name in `dir`, e.g. `aggregates_20240122_100000.csv`.
pub fn timestamped_path(dir: &Path, prefix: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!(
        "{prefix}_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}
