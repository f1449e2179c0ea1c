#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Escapement survey pipeline.
//!
//! Chains row normalization -> point building -> boundary preparation ->
//! spatial association -> aggregation. Each stage consumes the complete
//! output of the previous one, and the first failure aborts the run with
//! an error naming the stage. Nothing here touches the environment or
//! scans directories: callers hand in the raw table and boundary layer
//! and persist the returned layers themselves.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use escapement_map_aggregate::{AggregateError, SummaryFields, summarize};
use escapement_map_boundary::{BoundaryError, load_boundaries, prepare_boundaries};
use escapement_map_spatial::{ProgressCallback, SpatialError, associate};
use escapement_map_survey::{
    RawTable, SurveyError, build_points, normalize_rows, read_raw_table_from_path,
};
use escapement_map_survey_models::{
    BoundaryLayer, JoinedLayer, PointLayer, ReferenceSystem, SummaryRow,
};
use thiserror::Error;

/// A pipeline failure, tagged with the stage that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The survey table could not be read.
    #[error("Reading survey table failed: {0}")]
    ReadSurvey(#[source] SurveyError),

    /// The boundary file could not be read.
    #[error("Reading boundaries failed: {0}")]
    ReadBoundaries(#[source] BoundaryError),

    /// The survey table has no usable header.
    #[error("Row normalization failed: {0}")]
    Normalization(#[source] SurveyError),

    /// A record could not become a point.
    #[error("Point building failed: {0}")]
    PointBuilding(#[source] SurveyError),

    /// A boundary polygon could not be reprojected or repaired.
    #[error("Polygon preparation failed: {0}")]
    PolygonPreparation(#[from] BoundaryError),

    /// Points could not be associated with boundaries.
    #[error("Spatial association failed: {0}")]
    Association(#[from] SpatialError),

    /// The joined layer could not be summarized.
    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] AggregateError),
}

/// Raw inputs for one run.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    /// Survey table, header row first, positional index in column 0.
    pub table: RawTable,
    /// Boundary polygons in their declared reference system.
    pub boundaries: BoundaryLayer,
}

impl PipelineInput {
    /// Reads both inputs from disk.
    ///
    /// `boundary_crs` overrides the reference system declared in the
    /// boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ReadSurvey`] or
    /// [`PipelineError::ReadBoundaries`] if either file cannot be read or
    /// parsed.
    pub fn load(
        survey: &Path,
        delimiter: u8,
        boundaries: &Path,
        boundary_crs: Option<ReferenceSystem>,
    ) -> Result<Self, PipelineError> {
        let table =
            read_raw_table_from_path(survey, delimiter).map_err(PipelineError::ReadSurvey)?;
        let boundaries =
            load_boundaries(boundaries, boundary_crs).map_err(PipelineError::ReadBoundaries)?;
        Ok(Self { table, boundaries })
    }
}

/// Tunable behaviour for one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Source fields feeding the summary table.
    pub summary: SummaryFields,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Survey points in EPSG:4326 with truncated field names.
    pub points: PointLayer,
    /// Points with inherited boundary attributes and `Join_Count`.
    pub joined: JoinedLayer,
    /// One row per (stock, species, section, observer) group.
    pub summary: Vec<SummaryRow>,
}

/// Runs every stage on `input`.
///
/// # Errors
///
/// Returns the first stage failure as a [`PipelineError`]. No partial
/// output is produced.
pub fn run(
    input: PipelineInput,
    options: &PipelineOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PipelineOutput, PipelineError> {
    let start = Instant::now();

    let records = normalize_rows(&input.table).map_err(PipelineError::Normalization)?;
    let points = build_points(records).map_err(PipelineError::PointBuilding)?;
    let boundaries = prepare_boundaries(input.boundaries, PointLayer::REFERENCE_SYSTEM)?;
    let joined = associate(points.clone(), &boundaries, progress)?;
    let summary = summarize(&joined, &options.summary)?;

    log::info!(
        "Pipeline complete in {:.2?}: {} points, {} unmatched, {} summary rows",
        start.elapsed(),
        joined.features.len(),
        joined.unmatched().count(),
        summary.len()
    );

    Ok(PipelineOutput {
        points,
        joined,
        summary,
    })
}
