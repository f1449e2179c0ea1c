//! Summary table export.

use std::io::Write;
use std::path::Path;

use escapement_map_survey_models::{SUMMARY_COLUMNS, SummaryRow, TIMESTAMP_FORMAT, format_number};
use rust_xlsxwriter::Workbook;

use crate::ExportError;

/// Marker written for missing summary cells unless configured otherwise.
pub const DEFAULT_MISSING_MARKER: &str = "NA";

/// Worksheet name in the exported workbook.
const SHEET_NAME: &str = "Summary";

/// One rendered summary table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryCell {
    /// No value; rendered with the missing marker.
    Missing,
    /// Numeric value.
    Number(f64),
    /// Text value, including formatted timestamps.
    Text(String),
}

impl SummaryCell {
    fn render(&self, missing_marker: &str) -> String {
        match self {
            Self::Missing => missing_marker.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }
}

fn text_cell(value: Option<&String>) -> SummaryCell {
    value.map_or(SummaryCell::Missing, |s| SummaryCell::Text(s.clone()))
}

/// Renders `row` into cells aligned with [`SUMMARY_COLUMNS`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summary_cells(row: &SummaryRow) -> [SummaryCell; 8] {
    [
        text_cell(row.stock.as_ref()),
        text_cell(row.species.as_ref()),
        text_cell(row.sect_code.as_ref()),
        text_cell(row.sampler_name.as_ref()),
        SummaryCell::Number(row.frequency as f64),
        SummaryCell::Number(row.sum_count),
        row.mean_overall_rating
            .map_or(SummaryCell::Missing, SummaryCell::Number),
        row.first_device_time.map_or(SummaryCell::Missing, |t| {
            SummaryCell::Text(t.format(TIMESTAMP_FORMAT).to_string())
        }),
    ]
}

/// Writes the summary table as comma-delimited text with a header row.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if writing fails.
pub fn write_summary_csv<W: Write>(
    writer: W,
    rows: &[SummaryRow],
    missing_marker: &str,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SUMMARY_COLUMNS)?;

    for row in rows {
        wtr.write_record(summary_cells(row).iter().map(|c| c.render(missing_marker)))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the summary table to a delimited text file at `path`.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the file cannot be created, or
/// [`ExportError::Csv`] if writing fails.
pub fn write_summary_csv_to_path(
    path: &Path,
    rows: &[SummaryRow],
    missing_marker: &str,
) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_summary_csv(file, rows, missing_marker)?;
    log::info!("Wrote {} summary rows to {}", rows.len(), path.display());
    Ok(())
}

/// Builds a workbook holding the summary table on one worksheet.
///
/// Numeric cells are written as numbers. Missing cells hold the marker.
///
/// # Errors
///
/// Returns [`ExportError::Xlsx`] if a cell cannot be written.
pub fn summary_workbook(rows: &[SummaryRow], missing_marker: &str) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in (0_u16..).zip(SUMMARY_COLUMNS) {
        worksheet.write_string(0, col, header)?;
    }

    for (row_idx, row) in (1_u32..).zip(rows) {
        for (col, cell) in (0_u16..).zip(summary_cells(row)) {
            match cell {
                SummaryCell::Number(n) => worksheet.write_number(row_idx, col, n)?,
                SummaryCell::Text(s) => worksheet.write_string(row_idx, col, &s)?,
                SummaryCell::Missing => worksheet.write_string(row_idx, col, missing_marker)?,
            };
        }
    }

    Ok(workbook)
}

/// Writes the summary table to an xlsx workbook at `path`.
///
/// # Errors
///
/// Returns [`ExportError::Xlsx`] if the workbook cannot be built or saved.
pub fn write_summary_xlsx(
    path: &Path,
    rows: &[SummaryRow],
    missing_marker: &str,
) -> Result<(), ExportError> {
    let mut workbook = summary_workbook(rows, missing_marker)?;
    workbook.save(path)?;
    log::info!("Wrote {} summary rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn rows() -> Vec<SummaryRow> {
        vec![
            SummaryRow {
                stock: None,
                species: None,
                sect_code: None,
                sampler_name: Some("Smith".to_string()),
                frequency: 1,
                sum_count: 0.0,
                mean_overall_rating: None,
                first_device_time: None,
            },
            SummaryRow {
                stock: Some("X".to_string()),
                species: Some("Chum".to_string()),
                sect_code: Some("12".to_string()),
                sampler_name: Some("Smith, J.".to_string()),
                frequency: 2,
                sum_count: 15.0,
                mean_overall_rating: Some(3.5),
                first_device_time: NaiveDate::from_ymd_opt(2023, 9, 14)
                    .unwrap()
                    .and_hms_opt(8, 5, 0),
            },
        ]
    }

    #[test]
    fn writes_header_and_rows() {
        let mut out = Vec::new();
        write_summary_csv(&mut out, &rows(), DEFAULT_MISSING_MARKER).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "STOCK,SPECIES,SECT_CODE,SAMPLERNAME,FREQUENCY,SUM_COUNT,MEAN_OVERALL_RATING,FIRST_DEVICE_TIME"
        );
        assert_eq!(lines[1], "NA,NA,NA,Smith,1,0,NA,NA");
        assert_eq!(lines[2], "X,Chum,12,\"Smith, J.\",2,15,3.5,2023-09-14 08:05:00");
    }

    #[test]
    fn uses_configured_missing_marker() {
        let mut out = Vec::new();
        write_summary_csv(&mut out, &rows()[..1], "").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some(",,,Smith,1,0,,"));
    }

    #[test]
    fn cells_keep_numbers_numeric() {
        let cells = summary_cells(&rows()[1]);
        assert_eq!(cells[4], SummaryCell::Number(2.0));
        assert_eq!(cells[6], SummaryCell::Number(3.5));
        assert_eq!(summary_cells(&rows()[0])[6], SummaryCell::Missing);
    }

    #[test]
    fn builds_workbook() {
        let mut workbook = summary_workbook(&rows(), DEFAULT_MISSING_MARKER).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();
        // xlsx files are zip archives.
        assert!(bytes.starts_with(b"PK"));
    }
}
