//! Configuration for gazejoin.

use crate::core::events::{DurationUnit, EndColumn, EventColumns};
use crate::core::joiner::{IntervalJoiner, DEFAULT_LABEL_COLUMN};
use crate::core::samples::SampleColumns;
use crate::export::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Confidence threshold used by `aggregate` when none is given
    pub default_min_confidence: f64,

    /// Column mapping used when no preset is given
    pub default_preset: Preset,

    /// Name of the label column written by `tag`
    pub label_column: String,

    /// Aggregate output format used when none is given
    pub output_format: OutputFormat,

    /// Unit of event duration columns
    pub duration_unit: DurationUnit,

    /// Directory for outputs written without an explicit path
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gazejoin");

        Self {
            default_min_confidence: 0.8,
            default_preset: Preset::PupilFixations,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            output_format: OutputFormat::Csv,
            duration_unit: DurationUnit::Milliseconds,
            export_path: data_dir.join("exports"),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does
    /// not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating its parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gazejoin")
            .join("config.json")
    }

    /// Joiner for `preset` with this config's label column and duration unit.
    pub fn joiner(&self, preset: Preset) -> IntervalJoiner {
        let mut joiner = preset.joiner().with_label_column(self.label_column.clone());
        if let EndColumn::Duration { unit, .. } = &mut joiner.events.end {
            *unit = self.duration_unit;
        }
        joiner
    }
}

/// Column mappings for the export files the notebooks combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Pupil positions against fixations
    PupilFixations,
    /// Gaze positions against fixations
    GazeFixations,
    /// Gaze positions against blinks
    GazeBlinks,
    /// Gaze positions against surface-mapped fixations
    SurfaceFixations,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::PupilFixations,
        Preset::GazeFixations,
        Preset::GazeBlinks,
        Preset::SurfaceFixations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::PupilFixations => "pupil-fixations",
            Preset::GazeFixations => "gaze-fixations",
            Preset::GazeBlinks => "gaze-blinks",
            Preset::SurfaceFixations => "surface-fixations",
        }
    }

    pub fn sample_columns(&self) -> SampleColumns {
        match self {
            Preset::PupilFixations => SampleColumns::pupil_positions(),
            _ => SampleColumns::gaze_positions(),
        }
    }

    pub fn event_columns(&self) -> EventColumns {
        match self {
            Preset::PupilFixations | Preset::GazeFixations => EventColumns::fixations(),
            Preset::GazeBlinks => EventColumns::blinks(),
            Preset::SurfaceFixations => EventColumns::surface_fixations(),
        }
    }

    pub fn joiner(&self) -> IntervalJoiner {
        IntervalJoiner::new(self.sample_columns(), self.event_columns())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase().replace('_', "-");
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(ConfigError::UnknownPreset(s))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),
}
