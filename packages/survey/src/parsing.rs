//! Cell parsing for survey tables.
//!
//! Every raw cell is typed once during normalization: blanks and `NA`
//! become missing, finite decimals become numbers, recognized device
//! timestamps become timestamps, and everything else stays text.

use chrono::{DateTime, NaiveDateTime};
use escapement_map_survey_models::FieldValue;

/// Placeholder written by the survey export for absent values.
pub const MISSING_MARKER: &str = "NA";

/// Timestamp layouts produced by the survey devices and spreadsheet
/// exports, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Types a single raw cell.
#[must_use]
pub fn parse_cell(raw: &str) -> FieldValue {
    let s = raw.trim();

    if s.is_empty() || s == MISSING_MARKER {
        return FieldValue::Missing;
    }

    if let Some(n) = parse_finite(s) {
        return FieldValue::Number(n);
    }

    if let Some(t) = parse_timestamp(s) {
        return FieldValue::Timestamp(t);
    }

    FieldValue::Text(s.to_string())
}

/// Parses a finite `f64`. Rejects `NaN` and infinities.
#[must_use]
pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses a device timestamp. Offsets in RFC 3339 input are normalized to
/// UTC.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks_and_na_are_missing() {
        assert_eq!(parse_cell(""), FieldValue::Missing);
        assert_eq!(parse_cell("   "), FieldValue::Missing);
        assert_eq!(parse_cell("NA"), FieldValue::Missing);
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_cell("-123.456"), FieldValue::Number(-123.456));
        assert_eq!(parse_cell(" 42 "), FieldValue::Number(42.0));
    }

    #[test]
    fn non_finite_numbers_stay_text() {
        assert_eq!(parse_cell("NaN"), FieldValue::Text("NaN".to_string()));
        assert_eq!(parse_cell("inf"), FieldValue::Text("inf".to_string()));
    }

    #[test]
    fn parses_device_timestamps() {
        let dt = parse_timestamp("2023-09-14 08:05:00").unwrap();
        assert_eq!(dt.to_string(), "2023-09-14 08:05:00");

        let dt = parse_timestamp("2023-09-14T08:05:00.250").unwrap();
        assert_eq!(dt.to_string(), "2023-09-14 08:05:00.250");

        let dt = parse_timestamp("09/14/2023 08:05").unwrap();
        assert_eq!(dt.to_string(), "2023-09-14 08:05:00");
    }

    #[test]
    fn rfc3339_is_normalized_to_utc() {
        let dt = parse_timestamp("2023-09-14T08:05:00-07:00").unwrap();
        assert_eq!(dt.to_string(), "2023-09-14 15:05:00");
    }

    #[test]
    fn rejects_invalid_timestamp() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert_eq!(parse_cell("Smith"), FieldValue::Text("Smith".to_string()));
    }
}
