//! Row normalization.
//!
//! Turns a [`RawTable`] whose first column is a positional index and whose
//! first row holds the field names into a [`RecordSet`]. Placeholder
//! columns (blank or literally `NA`) are dropped along with the index.

use std::collections::BTreeSet;

use escapement_map_survey_models::{
    FieldValue, LATITUDE_FIELD, LONGITUDE_FIELD, RecordSet, SurveyRecord,
};

use crate::SurveyError;
use crate::parsing::{MISSING_MARKER, parse_cell};
use crate::reader::RawTable;

/// Fields every survey table must provide.
const MANDATORY_FIELDS: &[&str] = &[LONGITUDE_FIELD, LATITUDE_FIELD];

/// Normalizes a raw survey table.
///
/// Rows with no text at all, index included, are skipped. Any other row
/// becomes a record, even when every kept cell is missing. Rows shorter
/// than the header are padded with missing values.
///
/// # Errors
///
/// Returns [`SurveyError::MalformedInput`] if the table is empty, the
/// header contains duplicate names, a mandatory field is absent, or a row
/// has more cells than the header.
pub fn normalize_rows(table: &RawTable) -> Result<RecordSet, SurveyError> {
    let Some((header, rows)) = table.rows.split_first() else {
        return Err(SurveyError::MalformedInput {
            message: "survey table has no header row".to_string(),
        });
    };

    let columns = header_columns(header)?;
    let fields: Vec<String> = columns.iter().map(|(_, name)| name.clone()).collect();

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0_usize;

    for (i, row) in rows.iter().enumerate() {
        let source_line = i + 2;

        if row.len() > header.len() {
            return Err(SurveyError::MalformedInput {
                message: format!(
                    "line {source_line} has {} cells but the header has {}",
                    row.len(),
                    header.len()
                ),
            });
        }

        if row.iter().all(|cell| cell.trim().is_empty()) {
            log::debug!("Skipping blank line {source_line}");
            skipped += 1;
            continue;
        }

        let values: Vec<FieldValue> = columns
            .iter()
            .map(|(col, _)| row.get(*col).map_or(FieldValue::Missing, |c| parse_cell(c)))
            .collect();

        let label = row
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        records.push(SurveyRecord {
            source_line,
            label,
            values,
        });
    }

    log::info!(
        "Normalized {} survey records with {} fields ({skipped} blank rows skipped)",
        records.len(),
        fields.len()
    );

    Ok(RecordSet { fields, records })
}

/// Resolves the kept columns of the header as `(column index, name)` pairs.
fn header_columns(header: &[String]) -> Result<Vec<(usize, String)>, SurveyError> {
    let mut columns = Vec::new();
    let mut seen = BTreeSet::new();

    // Column 0 is the positional index.
    for (col, raw) in header.iter().enumerate().skip(1) {
        let name = raw.trim().trim_start_matches('\u{feff}').trim();

        if name.is_empty() || name == MISSING_MARKER {
            log::debug!("Dropping placeholder column {col} ({raw:?})");
            continue;
        }

        if !seen.insert(name.to_string()) {
            return Err(SurveyError::MalformedInput {
                message: format!("duplicate field name '{name}' in header"),
            });
        }

        columns.push((col, name.to_string()));
    }

    for field in MANDATORY_FIELDS {
        if !seen.contains(*field) {
            return Err(SurveyError::MalformedInput {
                message: format!("mandatory field '{field}' is missing from the header"),
            });
        }
    }

    Ok(columns)
}
