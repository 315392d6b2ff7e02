//! Summary statistics over time series columns.
//!
//! Dashboards print a small table under every chart. The values are taken
//! over the non-zero entries of one column across all rows: a second in which
//! a label did nothing does not drag its average down.

use serde::Serialize;

use crate::{
    format::serialize_number,
    label::{percentile, upper_median},
    report::{Report, SeriesPoint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A per-label column of the time series.
pub enum SeriesMetric {
    /// `requestsPerSecond`
    Requests,
    /// `errorsPerSecond`
    Errors,
    /// `checksPerSecond`
    Checks,
    /// `activeThreads`
    ActiveThreads,
    /// `bytes`
    Bytes,
    /// `sentBytes`
    SentBytes,
    /// `elapsed`
    Elapsed,
    /// `latency`
    Latency,
}

impl SeriesMetric {
    fn value(self, point: &SeriesPoint) -> f64 {
        match self {
            SeriesMetric::Requests => point.requests as f64,
            SeriesMetric::Errors => point.errors as f64,
            SeriesMetric::Checks => point.checks as f64,
            SeriesMetric::ActiveThreads => point.active_threads as f64,
            SeriesMetric::Bytes => point.bytes,
            SeriesMetric::SentBytes => point.sent_bytes,
            SeriesMetric::Elapsed => point.elapsed,
            SeriesMetric::Latency => point.latency,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
/// Statistics of one series column.
pub struct SeriesSummary {
    /// Mean.
    #[serde(serialize_with = "serialize_number")]
    pub avg: f64,
    /// Smallest value.
    #[serde(serialize_with = "serialize_number")]
    pub min: f64,
    /// Largest value.
    #[serde(serialize_with = "serialize_number")]
    pub max: f64,
    /// Upper median.
    #[serde(serialize_with = "serialize_number")]
    pub median: f64,
    /// Floor-indexed 90th percentile.
    #[serde(serialize_with = "serialize_number")]
    pub p90: f64,
    /// Floor-indexed 95th percentile.
    #[serde(serialize_with = "serialize_number")]
    pub p95: f64,
}

impl SeriesSummary {
    /// Summarize `values`, ignoring zero and non-finite entries.
    #[must_use]
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values: Vec<f64> = values
            .into_iter()
            .filter(|v| v.is_finite() && *v != 0.0)
            .collect();
        if values.is_empty() {
            return Self::default();
        }
        values.sort_unstable_by(f64::total_cmp);

        let sum: f64 = values.iter().sum();
        Self {
            avg: sum / values.len() as f64,
            min: values[0],
            max: values[values.len() - 1],
            median: upper_median(&values),
            p90: percentile(&values, 0.9),
            p95: percentile(&values, 0.95),
        }
    }
}

impl Report {
    /// Summarize `metric` for `label`, or for every label when `None`.
    #[must_use]
    pub fn series_summary(&self, metric: SeriesMetric, label: Option<&str>) -> SeriesSummary {
        SeriesSummary::of(
            self.time_series_data
                .iter()
                .flat_map(|row| row.points.iter())
                .filter(|p| label.is_none_or(|l| &*p.label == l))
                .map(|p| metric.value(p)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_are_ignored() {
        let summary = SeriesSummary::of([0.0, 4.0, 0.0, 2.0, 6.0, f64::NAN]);
        assert_eq!(summary.avg, 4.0);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 6.0);
        assert_eq!(summary.median, 4.0);
        assert_eq!(summary.p90, 6.0);
        assert_eq!(summary.p95, 6.0);
    }

    #[test]
    fn all_zero_is_default() {
        assert_eq!(SeriesSummary::of([0.0, 0.0]), SeriesSummary::default());
        assert_eq!(SeriesSummary::of([]), SeriesSummary::default());
    }

    #[test]
    fn serializes_whole_numbers_as_integers() {
        let json = serde_json::to_string(&SeriesSummary::of([1.0, 2.0])).expect("serializable");
        assert_eq!(
            json,
            r#"{"avg":1.5,"min":1,"max":2,"median":2,"p90":2,"p95":2}"#
        );
    }
}
