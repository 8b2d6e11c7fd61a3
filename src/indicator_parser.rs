//! Parser for indicator JSON payloads
//!
//! An indicator response wraps a flat list of observations under
//! `indicator.values`; each observation carries a UTC timestamp, a
//! geographic zone name and a numeric value. The list pivots into a
//! [`Table`]: one row per distinct timestamp, one column per distinct zone,
//! both in first-appearance order. A repeated (timestamp, zone) pair
//! overwrites the earlier value.

use serde::Deserialize;

use crate::error::{EsiosError, ParseError};
use crate::time_axis::parse_wire_timestamp;
use crate::types::Table;

/// A single indicator observation
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorRecord {
    /// Observation timestamp, ISO-8601 in UTC
    pub datetime_utc: String,

    /// Geographic zone the value applies to (e.g. "España", "Península")
    pub geo_name: String,

    /// Observed value in the indicator's native unit
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct IndicatorEnvelope {
    indicator: IndicatorBody,
}

#[derive(Debug, Deserialize)]
struct IndicatorBody {
    #[serde(default)]
    values: Vec<IndicatorRecord>,
}

/// Parse a raw indicator JSON payload into a pivoted table
///
/// The payload must carry the `{"indicator": {"values": [...]}}` envelope.
/// An empty or absent value list yields an empty table.
pub fn parse_indicator_json(data: &[u8]) -> Result<Table, EsiosError> {
    let envelope: IndicatorEnvelope =
        serde_json::from_slice(data).map_err(|e| ParseError::Json(e.to_string()))?;
    parse_indicator_records(&envelope.indicator.values)
}

/// Pivot a list of observations into a timestamp × zone table
///
/// Rows and columns grow in first-appearance order; cells never observed
/// stay at zero. Timestamps are re-expressed in the service's display
/// offset while placement stays instant-based.
pub fn parse_indicator_records(records: &[IndicatorRecord]) -> Result<Table, EsiosError> {
    let mut table = Table::new();
    for record in records {
        let ts = parse_wire_timestamp(&record.datetime_utc)?
            .with_timezone(&crate::display_offset());
        table.upsert(ts, &record.geo_name, record.value);
    }
    tracing::debug!(
        rows = table.num_rows(),
        zones = table.num_cols(),
        "parsed indicator payload"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn record(ts: &str, geo: &str, value: f64) -> IndicatorRecord {
        IndicatorRecord {
            datetime_utc: ts.to_string(),
            geo_name: geo.to_string(),
            value,
        }
    }

    #[test]
    fn test_pivot_rows_and_columns_in_first_appearance_order() {
        let records = vec![
            record("2021-06-01T00:00:00Z", "España", 10.0),
            record("2021-06-01T00:00:00Z", "Portugal", 20.0),
            record("2021-06-01T01:00:00Z", "España", 11.0),
        ];
        let table = parse_indicator_records(&records).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.columns(), &["España".to_string(), "Portugal".to_string()]);

        let madrid = FixedOffset::east_opt(3600).unwrap();
        let first = madrid.with_ymd_and_hms(2021, 6, 1, 1, 0, 0).unwrap();
        assert_eq!(table.get(&first, "España"), Some(10.0));
        assert_eq!(table.get(&first, "Portugal"), Some(20.0));
    }

    #[test]
    fn test_unobserved_cells_are_zero() {
        let records = vec![
            record("2021-06-01T00:00:00Z", "España", 10.0),
            record("2021-06-01T01:00:00Z", "Portugal", 20.0),
        ];
        let table = parse_indicator_records(&records).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_cols(), 2);
        assert_eq!(table.value_at(0, 1), Some(0.0));
        assert_eq!(table.value_at(1, 0), Some(0.0));
    }

    #[test]
    fn test_duplicate_observation_last_write_wins() {
        let records = vec![
            record("2021-06-01T00:00:00Z", "España", 10.0),
            record("2021-06-01T00:00:00Z", "España", 99.0),
        ];
        let table = parse_indicator_records(&records).unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.value_at(0, 0), Some(99.0));
    }

    #[test]
    fn test_index_uses_display_offset() {
        let records = vec![record("2021-06-01T00:00:00Z", "España", 10.0)];
        let table = parse_indicator_records(&records).unwrap();
        assert_eq!(table.index()[0].offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_envelope_parsing() {
        let payload = r#"{
            "indicator": {
                "name": "Demanda real",
                "values": [
                    {"datetime_utc": "2021-06-01T00:00:00Z", "geo_name": "España", "value": 25000.5},
                    {"datetime_utc": "2021-06-01T01:00:00Z", "geo_name": "España", "value": 24100.0}
                ]
            }
        }"#;
        let table = parse_indicator_json(payload.as_bytes()).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.value_at(0, 0), Some(25000.5));
        assert_eq!(table.value_at(1, 0), Some(24100.0));
    }

    #[test]
    fn test_empty_values_yield_empty_table() {
        let payload = br#"{"indicator": {"values": []}}"#;
        let table = parse_indicator_json(payload).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_cols(), 0);
    }

    #[test]
    fn test_missing_envelope_is_json_error() {
        let err = parse_indicator_json(br#"{"values": []}"#).unwrap_err();
        assert!(matches!(err, EsiosError::Parse(ParseError::Json(_))));
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let records = vec![record("yesterday", "España", 1.0)];
        let err = parse_indicator_records(&records).unwrap_err();
        assert!(matches!(
            err,
            EsiosError::Parse(ParseError::InvalidTimestamp(_))
        ));
    }
}
