//! Number, time and duration formatting for report output.

use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Serializer;

/// Round to two decimal places, half away from zero. Non-finite input is
/// reported as `0` so that NaN and infinities never reach the output.
#[must_use]
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid emitting -0.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Serialize an `f64` as an integer when it has no fractional part.
///
/// Reports are consumed by JavaScript renderers that print `200`, not
/// `200.0`. Non-finite values serialize as `0`.
///
/// # Errors
///
/// Propagates errors from the underlying serializer.
#[allow(clippy::trivially_copy_pass_by_ref, clippy::cast_possible_truncation)]
pub fn serialize_number<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let value = *value;
    if !value.is_finite() {
        serializer.serialize_i64(0)
    } else if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

/// Zone in which human-readable timestamps are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// Coordinated universal time.
    #[default]
    Utc,
    /// The host's local zone.
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

/// Errors produced when parsing a [`DisplayZone`].
#[derive(thiserror::Error, Debug, Clone)]
#[error("invalid display zone {input:?}, expected 'utc', 'local' or an offset like '+03:00'")]
pub struct ZoneParseError {
    input: String,
}

impl FromStr for DisplayZone {
    type Err = ZoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "utc" | "z" => Ok(DisplayZone::Utc),
            "local" => Ok(DisplayZone::Local),
            _ => trimmed
                .parse::<FixedOffset>()
                .map(|offset| {
                    if offset.local_minus_utc() == 0 {
                        DisplayZone::Utc
                    } else {
                        DisplayZone::Fixed(offset)
                    }
                })
                .map_err(|_| ZoneParseError {
                    input: s.to_string(),
                }),
        }
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayZone::Utc => write!(f, "utc"),
            DisplayZone::Local => write!(f, "local"),
            DisplayZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl DisplayZone {
    fn render(self, epoch_ms: i64, pattern: &str) -> String {
        let Some(instant) = DateTime::<Utc>::from_timestamp_millis(epoch_ms) else {
            return String::new();
        };
        match self {
            DisplayZone::Utc => instant.format(pattern).to_string(),
            DisplayZone::Local => instant.with_timezone(&Local).format(pattern).to_string(),
            DisplayZone::Fixed(offset) => instant.with_timezone(&offset).format(pattern).to_string(),
        }
    }

    /// Render `epoch_ms` as a 24-hour time of day, `HH:MM:SS`.
    #[must_use]
    pub fn time_of_day(self, epoch_ms: i64) -> String {
        self.render(epoch_ms, "%H:%M:%S")
    }

    /// Render `epoch_ms` as `dd/mm/yyyy, HH:MM:SS`.
    #[must_use]
    pub fn date_time(self, epoch_ms: i64) -> String {
        self.render(epoch_ms, "%d/%m/%Y, %H:%M:%S")
    }
}

/// Format a millisecond duration as `{h}h {m}m {s}s`, dropping leading units
/// that are zero. Sub-second and non-positive durations read `0s`.
#[must_use]
pub fn duration(ms: i64) -> String {
    if ms <= 0 {
        return "0s".to_string();
    }
    let seconds = ms / 1_000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{hours}h {}m {}s", minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(200.0), 200.0);
        assert_eq!(round2(-0.001), 0.0);
        assert_eq!(round2(f64::NAN), 0.0);
        assert_eq!(round2(f64::INFINITY), 0.0);
    }

    #[test]
    fn durations() {
        assert_eq!(duration(0), "0s");
        assert_eq!(duration(-5), "0s");
        assert_eq!(duration(999), "0s");
        assert_eq!(duration(1_000), "1s");
        assert_eq!(duration(61_500), "1m 1s");
        assert_eq!(duration(3_600_000), "1h 0m 0s");
        assert_eq!(duration(3_723_000), "1h 2m 3s");
    }

    #[test]
    fn utc_rendering() {
        let zone = DisplayZone::Utc;
        // 2023-11-14T22:13:20.000Z
        assert_eq!(zone.time_of_day(1_700_000_000_000), "22:13:20");
        assert_eq!(zone.date_time(1_700_000_000_000), "14/11/2023, 22:13:20");
    }

    #[test]
    fn fixed_offset_rendering() {
        let zone: DisplayZone = "-03:00".parse().expect("valid offset");
        assert_eq!(zone.time_of_day(1_700_000_000_000), "19:13:20");
        assert_eq!(zone.date_time(1_700_000_000_000), "14/11/2023, 19:13:20");
    }

    #[test]
    fn zone_parsing() {
        assert_eq!("UTC".parse::<DisplayZone>().ok(), Some(DisplayZone::Utc));
        assert_eq!("local".parse::<DisplayZone>().ok(), Some(DisplayZone::Local));
        assert!("somewhere".parse::<DisplayZone>().is_err());
        assert_eq!("+00:00".parse::<DisplayZone>().ok(), Some(DisplayZone::Utc));
    }

    #[test]
    fn whole_numbers_serialize_as_integers() {
        #[derive(serde::Serialize)]
        struct Sample {
            #[serde(serialize_with = "serialize_number")]
            a: f64,
            #[serde(serialize_with = "serialize_number")]
            b: f64,
            #[serde(serialize_with = "serialize_number")]
            c: f64,
        }
        let json = serde_json::to_string(&Sample {
            a: 200.0,
            b: 12.34,
            c: f64::NAN,
        })
        .expect("serializable");
        assert_eq!(json, r#"{"a":200,"b":12.34,"c":0}"#);
    }
}
