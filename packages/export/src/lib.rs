#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence formats for pipeline results.
//!
//! The summary table is written as delimited text or as an xlsx workbook.
//! Point and joined layers are written as `GeoJSON` feature collections.

pub mod layers;
pub mod summary;

use thiserror::Error;

pub use layers::{joined_to_geojson, points_to_geojson, write_geojson};
pub use summary::{
    DEFAULT_MISSING_MARKER, SummaryCell, summary_cells, summary_workbook, write_summary_csv,
    write_summary_csv_to_path, write_summary_xlsx,
};

/// Errors that can occur while exporting results.
#[derive(Debug, Error)]
pub enum ExportError {
    /// I/O error writing an output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook writing failed.
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// A property value could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
