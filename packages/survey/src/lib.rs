#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey table ingestion.
//!
//! Reads the raw escapement table, normalizes it into a [`RecordSet`] with
//! unique field names, and turns every record into a point feature keyed by
//! its longitude/latitude.
//!
//! [`RecordSet`]: escapement_map_survey_models::RecordSet

pub mod normalize;
pub mod parsing;
pub mod points;
pub mod reader;

use escapement_map_survey_models::FieldNameCollision;
use thiserror::Error;

pub use normalize::normalize_rows;
pub use points::build_points;
pub use reader::{RawTable, read_raw_table, read_raw_table_from_path};

/// Errors that can occur while reading survey rows and building points.
#[derive(Debug, Error)]
pub enum SurveyError {
    /// I/O error while opening the survey table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The table cannot produce a unique, complete header.
    #[error("Malformed input: {message}")]
    MalformedInput {
        /// Description of what went wrong.
        message: String,
    },

    /// A record's longitude or latitude is missing or not a finite number.
    #[error("Malformed coordinate at {record}: {field} is {value}")]
    MalformedCoordinate {
        /// Source line and index label of the offending record.
        record: String,
        /// Coordinate field name.
        field: &'static str,
        /// The offending cell, rendered for display.
        value: String,
    },

    /// Two field names collapse to the same truncated name.
    #[error("Field name collision: {0}")]
    FieldNameCollision(#[from] FieldNameCollision),
}
