//! Raw input rows and their normalization into [`SampleRecord`].
//!
//! An external parser hands the engine one [`RawRow`] per input line: a
//! mapping from column name to string or number. [`validate`] turns that
//! mapping into a well-typed record or rejects it. Rejection happens for one
//! reason only, a missing or unusable timestamp. Every other field is coerced
//! to a default rather than failing the row.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Column names understood by [`validate`]. Column order in the input is
/// irrelevant, lookups are by name.
pub mod column {
    /// Epoch milliseconds at which the sample started.
    pub const TIMESTAMP: &str = "timeStamp";
    /// Request label.
    pub const LABEL: &str = "label";
    /// Elapsed time in milliseconds.
    pub const ELAPSED: &str = "elapsed";
    /// `"true"` or `"false"`.
    pub const SUCCESS: &str = "success";
    /// Active threads across all thread groups.
    pub const ALL_THREADS: &str = "allThreads";
    /// Latency in milliseconds.
    pub const LATENCY: &str = "Latency";
    /// Bytes received.
    pub const BYTES: &str = "bytes";
    /// Bytes sent.
    pub const SENT_BYTES: &str = "sentBytes";
    /// Response code, usually an HTTP status.
    pub const RESPONSE_CODE: &str = "responseCode";
    /// Response message.
    pub const RESPONSE_MESSAGE: &str = "responseMessage";
}

/// Label given to rows that carry none.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// A single field value as produced by the parser.
pub enum RawValue {
    /// An explicit null, JSON input only.
    Null,
    /// A boolean, JSON input only.
    Bool(bool),
    /// A number.
    Number(f64),
    /// Text, the only variant CSV input produces.
    Text(String),
}

impl RawValue {
    /// Textual view of this value. `None` for nulls.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Null => None,
            RawValue::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            RawValue::Number(n) => Some(Cow::Owned(number_text(*n))),
            RawValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
        }
    }

    /// Numeric view of this value. Empty text reads as zero, unparseable
    /// text and non-finite numbers as `None`.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            RawValue::Null | RawValue::Bool(_) => return None,
            RawValue::Number(n) => *n,
            RawValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse::<f64>().ok()?
                }
            }
        };
        n.is_finite().then_some(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
/// One parsed input row, keyed by column name.
pub struct RawRow {
    fields: FxHashMap<String, RawValue>,
}

impl RawRow {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, returning the row.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set `column` to `value`.
    pub fn insert(&mut self, column: &str, value: impl Into<RawValue>) {
        self.fields.insert(column.to_string(), value.into());
    }

    /// Look up the raw value of `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.fields.get(column)
    }

    /// Number of columns present in this row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether this row has no columns at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn text(&self, column: &str) -> Option<Cow<'_, str>> {
        self.get(column)
            .and_then(RawValue::as_text)
            .filter(|s| !s.is_empty())
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(RawValue::as_number)
    }

    fn non_negative(&self, column: &str) -> f64 {
        self.number(column).filter(|n| *n > 0.0).unwrap_or(0.0)
    }
}

impl<K, V> FromIterator<(K, V)> for RawRow
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The `success` column, read as a strict string comparison.
pub enum Outcome {
    /// Exactly `"true"`.
    Success,
    /// Exactly `"false"`.
    Failure,
    /// Anything else, including a missing column.
    Unknown,
}

impl Outcome {
    /// Whether this outcome counts toward the global success counter. Both
    /// `Failure` and `Unknown` count as errors there.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Whether this outcome is an explicit failure. Only explicit failures
    /// feed per-label error counts and error classification.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Failure)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One normalized load-test measurement.
pub struct SampleRecord {
    /// Epoch milliseconds, never zero.
    pub timestamp: i64,
    /// Request label, never empty.
    pub label: String,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
    /// Success flag.
    pub outcome: Outcome,
    /// Active threads at sample time.
    pub concurrency: u64,
    /// Latency in milliseconds.
    pub latency_ms: f64,
    /// Bytes received.
    pub bytes_received: f64,
    /// Bytes sent.
    pub bytes_sent: f64,
    /// Response code, if present and non-empty.
    pub response_code: Option<String>,
    /// Response message, if present and non-empty.
    pub response_message: Option<String>,
}

/// Normalize `raw` into a [`SampleRecord`].
///
/// Returns `None` when the timestamp is absent, empty, not a finite number,
/// zero once truncated to whole milliseconds or outside the range of
/// representable dates. Missing or invalid numeric
/// fields, negative ones included, become `0`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn validate(raw: &RawRow) -> Option<SampleRecord> {
    let timestamp = raw.number(column::TIMESTAMP)?.trunc();
    if timestamp == 0.0 {
        return None;
    }
    // Saturates, and the saturated ends are outside the representable range.
    let timestamp = timestamp as i64;
    if DateTime::<Utc>::from_timestamp_millis(timestamp).is_none() {
        return None;
    }

    let label = raw
        .text(column::LABEL)
        .map_or_else(|| UNKNOWN_LABEL.to_string(), Cow::into_owned);

    let outcome = match raw.text(column::SUCCESS).as_deref() {
        Some("true") => Outcome::Success,
        Some("false") => Outcome::Failure,
        _ => Outcome::Unknown,
    };

    Some(SampleRecord {
        timestamp,
        label,
        elapsed_ms: raw.non_negative(column::ELAPSED),
        outcome,
        concurrency: raw.non_negative(column::ALL_THREADS).floor() as u64,
        latency_ms: raw.non_negative(column::LATENCY),
        bytes_received: raw.non_negative(column::BYTES),
        bytes_sent: raw.non_negative(column::SENT_BYTES),
        response_code: raw.text(column::RESPONSE_CODE).map(Cow::into_owned),
        response_message: raw.text(column::RESPONSE_MESSAGE).map(Cow::into_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn full_row_is_normalized() {
        let raw = row(&[
            ("timeStamp", "1700000000123"),
            ("label", "Login"),
            ("elapsed", "250"),
            ("success", "true"),
            ("allThreads", "12"),
            ("Latency", "80"),
            ("bytes", "2048"),
            ("sentBytes", "512"),
            ("responseCode", "200"),
            ("responseMessage", "OK"),
        ]);
        let record = validate(&raw).expect("row must be accepted");
        assert_eq!(record.timestamp, 1_700_000_000_123);
        assert_eq!(record.label, "Login");
        assert_eq!(record.elapsed_ms, 250.0);
        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.concurrency, 12);
        assert_eq!(record.latency_ms, 80.0);
        assert_eq!(record.bytes_received, 2048.0);
        assert_eq!(record.bytes_sent, 512.0);
        assert_eq!(record.response_code.as_deref(), Some("200"));
        assert_eq!(record.response_message.as_deref(), Some("OK"));
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        for ts in ["", "0", "0.4", "abc", "NaN", "inf", "   "] {
            let raw = row(&[("timeStamp", ts), ("label", "x")]);
            assert!(validate(&raw).is_none(), "timestamp {ts:?} must be rejected");
        }
        assert!(validate(&row(&[("label", "x")])).is_none());
        assert!(validate(&RawRow::new().with("timeStamp", RawValue::Null)).is_none());
        assert!(validate(&RawRow::new().with("timeStamp", f64::NAN)).is_none());
    }

    #[test]
    fn unrepresentable_timestamps_are_rejected() {
        for ts in ["-1e300", "1e300", "9e18", "-9e18", "9e15", "-9e15"] {
            let raw = row(&[("timeStamp", ts), ("label", "x")]);
            assert!(validate(&raw).is_none(), "timestamp {ts:?} must be rejected");
        }
        let negative = validate(&row(&[("timeStamp", "-86400000")])).expect("pre-epoch date");
        assert_eq!(negative.timestamp, -86_400_000);
        let far = validate(&row(&[("timeStamp", "8e15")])).expect("year 255 thousand");
        assert_eq!(far.timestamp, 8_000_000_000_000_000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let record = validate(&row(&[("timeStamp", "1000")])).expect("accepted");
        assert_eq!(record.label, UNKNOWN_LABEL);
        assert_eq!(record.elapsed_ms, 0.0);
        assert_eq!(record.outcome, Outcome::Unknown);
        assert_eq!(record.concurrency, 0);
        assert_eq!(record.response_code, None);
        assert_eq!(record.response_message, None);
    }

    #[test]
    fn invalid_numbers_coerce_to_zero() {
        let raw = row(&[
            ("timeStamp", "1000"),
            ("label", ""),
            ("elapsed", "fast"),
            ("allThreads", "-3"),
            ("Latency", " 42 "),
            ("bytes", "1e3"),
        ]);
        let record = validate(&raw).expect("accepted");
        assert_eq!(record.label, UNKNOWN_LABEL);
        assert_eq!(record.elapsed_ms, 0.0);
        assert_eq!(record.concurrency, 0);
        assert_eq!(record.latency_ms, 42.0);
        assert_eq!(record.bytes_received, 1000.0);
    }

    #[test]
    fn success_is_a_strict_string_comparison() {
        let outcome = |s: &str| {
            validate(&row(&[("timeStamp", "1"), ("success", s)]))
                .expect("accepted")
                .outcome
        };
        assert_eq!(outcome("true"), Outcome::Success);
        assert_eq!(outcome("false"), Outcome::Failure);
        assert_eq!(outcome("TRUE"), Outcome::Unknown);
        assert_eq!(outcome("1"), Outcome::Unknown);
        assert_eq!(outcome(""), Outcome::Unknown);
    }

    #[test]
    fn json_values_are_understood() {
        let raw: RawRow = serde_json::from_str(
            r#"{"timeStamp": 1700000000000.7, "success": false, "responseCode": 404, "label": null}"#,
        )
        .expect("valid json row");
        let record = validate(&raw).expect("accepted");
        assert_eq!(record.timestamp, 1_700_000_000_000);
        assert_eq!(record.outcome, Outcome::Failure);
        assert_eq!(record.response_code.as_deref(), Some("404"));
        assert_eq!(record.label, UNKNOWN_LABEL);
    }

    proptest! {
        #[test]
        fn never_panics_on_arbitrary_text(
            fields in prop::collection::hash_map(
                prop_oneof![
                    Just(column::TIMESTAMP.to_string()),
                    Just(column::ELAPSED.to_string()),
                    Just(column::ALL_THREADS.to_string()),
                    Just(column::SUCCESS.to_string()),
                    Just(column::LABEL.to_string()),
                    "[a-zA-Z]{1,8}",
                ],
                ".*",
                0..8,
            ),
        ) {
            let raw: RawRow = fields.into_iter().collect();
            if let Some(record) = validate(&raw) {
                prop_assert!(record.timestamp != 0);
                prop_assert!(record.elapsed_ms >= 0.0 && record.elapsed_ms.is_finite());
                prop_assert!(!record.label.is_empty());
            }
        }
    }
}
