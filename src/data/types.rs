use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Rendering used by the database column and by forecast bodies.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a wall-clock timestamp in either `YYYY-MM-DD HH:MM:SS` or ISO form.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim();
    // `%.f` also matches an absent fraction (DateTime64 columns carry one)
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// One row of `total_load_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub total_load: f64,
}

/// Half-open interval `[start, end)`; `end = None` leaves it unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end: Some(end) }
    }

    pub fn since(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }
}

/// Serde adapter for a single timestamp in `TIMESTAMP_FORMAT`.
pub mod timestamp {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for a list of timestamps.
pub mod timestamp_list {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(list: &[NaiveDateTime], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(list.len()))?;
        for ts in list {
            seq.serialize_element(&format_timestamp(ts))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveDateTime>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| parse_timestamp(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_forms() {
        let a = parse_timestamp("2025-08-19 00:15:00").unwrap();
        let b = parse_timestamp("2025-08-19T00:15:00").unwrap();
        let c = parse_timestamp("2025-08-19T00:15:00.000").unwrap();
        let d = parse_timestamp("2025-08-19 00:15:00.000").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
        assert_eq!(format_timestamp(&a), "2025-08-19 00:15:00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("19/08/2025").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_window_bounds() {
        let start = parse_timestamp("2025-08-18 23:00:00").unwrap();
        let end = parse_timestamp("2025-08-19 00:00:00").unwrap();

        assert_eq!(TimeWindow::new(start, end).end, Some(end));
        assert_eq!(TimeWindow::since(start).end, None);
        assert_eq!(TimeWindow::since(start).start, start);
    }

    #[test]
    fn test_observation_json() {
        let obs: Observation =
            serde_json::from_str(r#"{"timestamp":"2025-08-18 23:45:00","total_load":5123.5}"#)
                .unwrap();
        assert_eq!(obs.timestamp, parse_timestamp("2025-08-18T23:45:00").unwrap());
        assert_eq!(obs.total_load, 5123.5);
    }
}
