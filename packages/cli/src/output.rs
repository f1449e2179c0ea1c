//! Persistence of pipeline results.

use escapement_map_export::{
    ExportError, joined_to_geojson, points_to_geojson, write_geojson, write_summary_csv_to_path,
    write_summary_xlsx,
};
use escapement_map_pipeline::PipelineOutput;
use escapement_map_survey_models::JoinedLayer;

use crate::config::OutputConfig;

/// Writes the point layer, joined layer, and both summary tables.
///
/// # Errors
///
/// Returns the first [`ExportError`] encountered.
pub fn write_all(config: &OutputConfig, output: &PipelineOutput) -> Result<(), ExportError> {
    std::fs::create_dir_all(&config.directory)?;

    write_geojson(&config.path(&config.points), points_to_geojson(&output.points)?)?;
    write_geojson(&config.path(&config.joined), joined_to_geojson(&output.joined)?)?;
    write_summary_csv_to_path(
        &config.path(&config.summary_csv),
        &output.summary,
        &config.missing_marker,
    )?;
    write_summary_xlsx(
        &config.path(&config.summary_xlsx),
        &output.summary,
        &config.missing_marker,
    )?;

    Ok(())
}

/// Prints every point that matched no boundary, one per line.
pub fn print_unmatched(joined: &JoinedLayer, sampler_field: &str) {
    println!("{:<24} {:>12} {:>12}  SAMPLER", "RECORD", "LONGITUDE", "LATITUDE");
    println!("{}", "-".repeat(64));

    for feature in joined.unmatched() {
        let location = feature.point.geometry();
        let sampler = joined
            .value(feature, sampler_field)
            .and_then(|value| value.key_string())
            .unwrap_or_default();
        println!(
            "{:<24} {:>12.6} {:>12.6}  {sampler}",
            feature.point.identifier(),
            location.x(),
            location.y()
        );
    }
}
