//! Raw delimited-text reading.
//!
//! The survey export carries a positional index in its first column and
//! the field names in its first row, so the file is read headerless and
//! every row is kept verbatim for [`crate::normalize`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::SurveyError;

/// Rows of string cells exactly as they appear in the source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// All rows, the header candidate first.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Creates a table from rows of string-like cells.
    #[must_use]
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = Vec<C>>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// Reads delimited text into a [`RawTable`].
///
/// Rows may have differing lengths; the normalizer decides what to do with
/// them.
///
/// # Errors
///
/// Returns [`SurveyError::Csv`] if the input is not valid delimited text.
pub fn read_raw_table<R: Read>(reader: R, delimiter: u8) -> Result<RawTable, SurveyError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(ToString::to_string).collect());
    }

    log::debug!("Read {} raw rows", rows.len());

    Ok(RawTable { rows })
}

/// Opens `path` and reads it with [`read_raw_table`].
///
/// # Errors
///
/// Returns [`SurveyError::Io`] if the file cannot be opened, or
/// [`SurveyError::Csv`] if it is not valid delimited text.
pub fn read_raw_table_from_path(path: &Path, delimiter: u8) -> Result<RawTable, SurveyError> {
    log::info!("Reading survey table from {}", path.display());
    let file = File::open(path)?;
    read_raw_table(BufReader::new(file), delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_ragged_rows() {
        let input = ",Longitude,Latitude\n1,-123.1,49.2\n2,-123.3\n";
        let table = read_raw_table(input.as_bytes(), b',').unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0], vec!["", "Longitude", "Latitude"]);
        assert_eq!(table.rows[2], vec!["2", "-123.3"]);
    }

    #[test]
    fn honors_delimiter() {
        let input = "\tA\tB\n1\tx\ty\n";
        let table = read_raw_table(input.as_bytes(), b'\t').unwrap();
        assert_eq!(table.rows[1], vec!["1", "x", "y"]);
    }

    #[test]
    fn unquotes_fields() {
        let input = ",SamplerName\n1,\"Smith, J\"\n";
        let table = read_raw_table(input.as_bytes(), b',').unwrap();
        assert_eq!(table.rows[1][1], "Smith, J");
    }
}
