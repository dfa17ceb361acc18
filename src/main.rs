//! gazejoin CLI
//!
//! Tag eye-tracking samples with event identifiers, or aggregate a sample
//! measurement per event.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gazejoin::{
    config::{Config, Preset},
    core::{DurationUnit, EndColumn, IntervalJoiner, JoinSummary, RowFilter, Statistic, Table},
    export::{self, OutputFormat, ReportBuilder},
    loader, VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gazejoin")]
#[command(version = VERSION)]
#[command(about = "Interval joins between eye-tracking events and sample streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every sample with the identifier of the event containing it
    Tag {
        #[command(flatten)]
        join: JoinArgs,

        /// Name of the label column to add
        #[arg(long)]
        label: Option<String>,

        /// Output CSV path ("-" for stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Aggregate a sample measurement per event
    Aggregate {
        #[command(flatten)]
        join: JoinArgs,

        /// Measurement column to aggregate (e.g. diameter_3d)
        #[arg(long)]
        field: String,

        /// Minimum sample confidence, in [0, 1]
        #[arg(long, allow_negative_numbers = true)]
        min_confidence: Option<f64>,

        /// Statistic: mean, count, median, min, max or std_dev
        #[arg(long, default_value = "mean")]
        statistic: String,

        /// Output format (csv, json or jsonl)
        #[arg(long)]
        format: Option<String>,

        /// Output path ("-" for stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the columns and inferred types of a CSV export
    Inspect {
        /// CSV file to inspect
        file: PathBuf,
    },

    /// List the built-in column presets
    Presets,

    /// Show configuration, updating any value given
    Config {
        /// Default minimum confidence for aggregation
        #[arg(long, allow_negative_numbers = true)]
        min_confidence: Option<f64>,

        /// Default column preset
        #[arg(long)]
        preset: Option<String>,

        /// Default label column
        #[arg(long)]
        label: Option<String>,

        /// Default aggregate output format
        #[arg(long)]
        format: Option<String>,

        /// Unit of event duration columns (ms or s)
        #[arg(long)]
        duration_unit: Option<String>,
    },
}

/// Inputs and column mapping shared by `tag` and `aggregate`.
#[derive(Args)]
struct JoinArgs {
    /// Sample table (gaze or pupil positions CSV)
    #[arg(long)]
    samples: PathBuf,

    /// Event table (fixations, blinks or surface fixations CSV)
    #[arg(long)]
    events: PathBuf,

    /// Column preset (see `gazejoin presets`)
    #[arg(long)]
    preset: Option<String>,

    /// Sample timestamp column
    #[arg(long)]
    sample_time: Option<String>,

    /// Sample confidence column
    #[arg(long)]
    confidence: Option<String>,

    /// Event identifier column
    #[arg(long)]
    event_id: Option<String>,

    /// Event start timestamp column
    #[arg(long)]
    event_start: Option<String>,

    /// Event end timestamp column
    #[arg(long, conflicts_with = "event_duration")]
    event_end: Option<String>,

    /// Event duration column
    #[arg(long)]
    event_duration: Option<String>,

    /// Unit of the event duration column (ms or s)
    #[arg(long)]
    duration_unit: Option<String>,

    /// Boolean event column; events where it is false are skipped
    #[arg(long)]
    validity: Option<String>,

    /// Keep only sample rows where COLUMN equals VALUE (repeatable)
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    sample_filters: Vec<String>,

    /// Keep only event rows where COLUMN equals VALUE (repeatable)
    #[arg(long = "event-where", value_name = "COLUMN=VALUE")]
    event_filters: Vec<String>,
}

impl JoinArgs {
    /// Build the joiner from the preset, then apply column overrides.
    fn joiner(&self, config: &Config) -> Result<IntervalJoiner> {
        let preset = match &self.preset {
            Some(name) => name.parse::<Preset>()?,
            None => config.default_preset,
        };
        let mut joiner = config.joiner(preset);

        if let Some(column) = &self.sample_time {
            joiner.samples.timestamp = column.clone();
        }
        if let Some(column) = &self.confidence {
            joiner.samples.confidence = column.clone();
        }
        if let Some(column) = &self.event_id {
            joiner.events.id = column.clone();
        }
        if let Some(column) = &self.event_start {
            joiner.events.start = column.clone();
        }
        if let Some(column) = &self.validity {
            joiner.events.validity = Some(column.clone());
        }

        let unit = match &self.duration_unit {
            Some(unit) => unit.parse::<DurationUnit>()?,
            None => config.duration_unit,
        };
        if let Some(column) = &self.event_end {
            joiner.events.end = EndColumn::Timestamp {
                column: column.clone(),
            };
        } else if let Some(column) = &self.event_duration {
            joiner.events.end = EndColumn::Duration {
                column: column.clone(),
                unit,
            };
        } else if let EndColumn::Duration { unit: preset_unit, .. } = &mut joiner.events.end {
            *preset_unit = unit;
        }

        Ok(joiner)
    }

    /// Load both tables and apply the row filters.
    fn load(&self) -> Result<(Table, Table)> {
        let samples = load_filtered(&self.samples, &self.sample_filters)?;
        let events = load_filtered(&self.events, &self.event_filters)?;
        Ok((samples, events))
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "gazejoin=debug"
    } else {
        "gazejoin=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(Config::config_path);

    let result = match cli.command {
        Commands::Tag {
            join,
            label,
            output,
        } => cmd_tag(&config_path, &join, label, output),
        Commands::Aggregate {
            join,
            field,
            min_confidence,
            statistic,
            format,
            output,
        } => cmd_aggregate(
            &config_path,
            &join,
            &field,
            min_confidence,
            &statistic,
            format.as_deref(),
            output,
        ),
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::Presets => {
            cmd_presets();
            Ok(())
        }
        Commands::Config {
            min_confidence,
            preset,
            label,
            format,
            duration_unit,
        } => cmd_config(
            &config_path,
            min_confidence,
            preset,
            label,
            format,
            duration_unit,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_tag(
    config_path: &Path,
    join: &JoinArgs,
    label: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mut joiner = join.joiner(&config)?;
    if let Some(label) = label {
        joiner.label_column = label;
    }

    let (samples, events) = join.load()?;
    let tagged = joiner
        .tag_samples(&samples, &events)
        .context("Tagging failed")?;

    let output = output.unwrap_or_else(|| {
        export::timestamped_path(
            &config.export_path,
            &format!("tagged_{}", samples.name()),
            OutputFormat::Csv,
        )
    });
    let writer = export::open_output(&output)?;
    export::write_csv(&tagged.table, writer)
        .with_context(|| format!("Could not write {output:?}"))?;

    if output != Path::new("-") {
        println!(
            "Tagged {} of {} samples with '{}' -> {:?}",
            tagged.summary.matched_samples, tagged.summary.samples, joiner.label_column, output
        );
        print_summary(&tagged.summary);
    }
    Ok(())
}

fn cmd_aggregate(
    config_path: &Path,
    join: &JoinArgs,
    field: &str,
    min_confidence: Option<f64>,
    statistic: &str,
    format: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let joiner = join.joiner(&config)?;
    let statistic: Statistic = statistic.parse()?;
    let format = match format {
        Some(f) => f.parse::<OutputFormat>()?,
        None => config.output_format,
    };
    let min_confidence = min_confidence.unwrap_or(config.default_min_confidence);

    let (samples, events) = join.load()?;
    let aggregates = joiner
        .summarize_by_event(&samples, &events, field, min_confidence, statistic)
        .context("Aggregation failed")?;

    let builder = ReportBuilder::new();
    let output = output.unwrap_or_else(|| {
        export::timestamped_path(&config.export_path, &format!("{field}_{statistic}"), format)
    });
    let writer = export::open_output(&output)?;
    export::write_aggregates(&aggregates, format, &builder, writer)
        .with_context(|| format!("Could not write {output:?}"))?;

    if output != Path::new("-") {
        println!(
            "{} of '{}' for {} events (confidence >= {}) -> {:?}",
            statistic,
            field,
            aggregates.rows.len(),
            min_confidence,
            output
        );
        println!("Run ID: {}", builder.run_id());
        print_summary(&aggregates.summary);
    }
    Ok(())
}

fn cmd_inspect(file: &Path) -> Result<()> {
    let table = loader::load_csv(file).with_context(|| format!("Could not load {file:?}"))?;

    println!("{} ({} rows)", table.name(), table.len());
    for (name, column) in table.columns() {
        println!("  {name}: {}", column.type_name());
    }
    Ok(())
}

fn cmd_presets() {
    println!("Column presets");
    println!("==============");
    for preset in Preset::ALL {
        let joiner = preset.joiner();
        let end = match &joiner.events.end {
            EndColumn::Timestamp { column } => column.clone(),
            EndColumn::Duration { column, unit } => format!("{column} ({unit})"),
        };
        println!();
        println!("{preset}");
        println!(
            "  samples: {}, {}",
            joiner.samples.timestamp, joiner.samples.confidence
        );
        println!(
            "  events:  {}, {}, {}{}",
            joiner.events.id,
            joiner.events.start,
            end,
            joiner
                .events
                .validity
                .as_deref()
                .map(|v| format!(", valid if {v}"))
                .unwrap_or_default()
        );
    }
}

fn cmd_config(
    config_path: &Path,
    min_confidence: Option<f64>,
    preset: Option<String>,
    label: Option<String>,
    format: Option<String>,
    duration_unit: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    let mut changed = false;

    if let Some(value) = min_confidence {
        gazejoin::core::check_confidence(value)?;
        config.default_min_confidence = value;
        changed = true;
    }
    if let Some(name) = preset {
        config.default_preset = name.parse()?;
        changed = true;
    }
    if let Some(label) = label {
        config.label_column = label;
        changed = true;
    }
    if let Some(format) = format {
        config.output_format = format.parse()?;
        changed = true;
    }
    if let Some(unit) = duration_unit {
        config.duration_unit = unit.parse()?;
        changed = true;
    }

    if changed {
        config
            .save_to(config_path)
            .with_context(|| format!("Could not save {config_path:?}"))?;
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load_from(path).with_context(|| format!("Could not load config {path:?}"))
}

fn load_filtered(path: &Path, filters: &[String]) -> Result<Table> {
    let mut table = loader::load_csv(path).with_context(|| format!("Could not load {path:?}"))?;
    for filter in filters {
        let filter: RowFilter = filter.parse()?;
        table = table.filter(&filter)?;
        tracing::info!("{}: {} rows after {}", table.name(), table.len(), filter);
    }
    Ok(table)
}

fn print_summary(summary: &JoinSummary) {
    println!();
    println!("Join Statistics:");
    println!("  Samples read: {}", summary.samples);
    println!("  Event rows read: {}", summary.events);
    println!("  Matched samples: {}", summary.matched_samples);
    if summary.invalid_events_skipped > 0 {
        println!("  Invalid events skipped: {}", summary.invalid_events_skipped);
    }
    if summary.duplicate_events_dropped > 0 {
        println!(
            "  Duplicate event rows dropped: {}",
            summary.duplicate_events_dropped
        );
    }
    if summary.low_confidence_excluded > 0 {
        println!(
            "  Low-confidence samples excluded: {}",
            summary.low_confidence_excluded
        );
    }
    if summary.undefined_aggregates > 0 {
        println!(
            "  Events with no qualifying samples: {}",
            summary.undefined_aggregates
        );
    }
}
