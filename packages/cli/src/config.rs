//! TOML configuration for the `escapement_map` binary.
//!
//! ```toml
//! [input]
//! survey = "data/aerial_survey.csv"
//! boundaries = "data/stream_sections.geojson"
//! boundary_crs = "EPSG:3005"
//!
//! [output]
//! directory = "out"
//!
//! [summary]
//! count = "Surveycount"
//! ```
//!
//! Every key is optional in the file. The input paths must come from
//! either the file or the command line.

use std::path::{Path, PathBuf};

use escapement_map_aggregate::SummaryFields;
use escapement_map_export::DEFAULT_MISSING_MARKER;
use escapement_map_survey_models::ReferenceSystem;
use serde::Deserialize;
use thiserror::Error;

/// Configuration file looked up in the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "escapement_map.toml";

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File that failed to read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Config`].
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required setting was given nowhere.
    #[error("No {key} given (set [input] {key} or pass --{flag})")]
    Missing {
        /// Key in the `[input]` table.
        key: &'static str,
        /// Equivalent command-line flag.
        flag: &'static str,
    },

    /// A setting has an unusable value.
    #[error("Invalid {key}: {message}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input locations.
    pub input: InputConfig,
    /// Output locations and rendering.
    pub output: OutputConfig,
    /// Source field names for the summary table.
    pub summary: SummaryFields,
}

/// The `[input]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Survey table (delimited text).
    pub survey: Option<PathBuf>,
    /// Boundary polygons (`GeoJSON`).
    pub boundaries: Option<PathBuf>,
    /// Overrides the reference system declared in the boundary file.
    pub boundary_crs: Option<String>,
    /// Survey table field delimiter.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            survey: None,
            boundaries: None,
            boundary_crs: None,
            delimiter: ',',
        }
    }
}

/// The `[output]` table. File names are relative to `directory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory all outputs are written to.
    pub directory: PathBuf,
    /// Point layer file name.
    pub points: String,
    /// Joined layer file name.
    pub joined: String,
    /// Summary table (delimited text) file name.
    pub summary_csv: String,
    /// Summary table (workbook) file name.
    pub summary_xlsx: String,
    /// Text written for missing summary cells.
    pub missing_marker: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            points: "survey_points.geojson".to_string(),
            joined: "survey_points_joined.geojson".to_string(),
            summary_csv: "summary.csv".to_string(),
            summary_xlsx: "summary.xlsx".to_string(),
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
        }
    }
}

impl OutputConfig {
    /// Full path of an output file name.
    #[must_use]
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }
}

/// Fully resolved input settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    /// Survey table path.
    pub survey: PathBuf,
    /// Boundary file path.
    pub boundaries: PathBuf,
    /// Parsed boundary reference system override.
    pub boundary_crs: Option<ReferenceSystem>,
    /// Single-byte delimiter.
    pub delimiter: u8,
}

impl Config {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not valid.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] if it exists, or defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if an explicitly given file cannot be
    /// read, or [`ConfigError::Toml`] if a file is not valid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Path::new(DEFAULT_CONFIG_FILE),
            None => {
                log::debug!("No configuration file, using defaults");
                return Ok(Self::default());
            }
        };

        log::info!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Validates the input settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if an input path is not set, or
    /// [`ConfigError::Invalid`] if the delimiter is not a single ASCII
    /// character or the boundary reference system is not recognized.
    pub fn resolve_input(&self) -> Result<ResolvedInput, ConfigError> {
        let survey = self.input.survey.clone().ok_or(ConfigError::Missing {
            key: "survey",
            flag: "survey",
        })?;
        let boundaries = self.input.boundaries.clone().ok_or(ConfigError::Missing {
            key: "boundaries",
            flag: "boundaries",
        })?;

        let delimiter = u8::try_from(self.input.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ConfigError::Invalid {
                key: "delimiter",
                message: format!("{:?} is not a single ASCII character", self.input.delimiter),
            })?;

        let boundary_crs = self
            .input
            .boundary_crs
            .as_deref()
            .map(|declared| {
                ReferenceSystem::parse(declared).ok_or_else(|| ConfigError::Invalid {
                    key: "boundary_crs",
                    message: format!("unsupported reference system {declared}"),
                })
            })
            .transpose()?;

        Ok(ResolvedInput {
            survey,
            boundaries,
            boundary_crs,
            delimiter,
        })
    }
}
