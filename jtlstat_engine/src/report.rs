//! The report document.
//!
//! [`assemble`] is pure marshaling: it receives the already finalized state of
//! one run and arranges it into the JSON shape downstream renderers consume.
//! Field names are part of that contract and must not change.

use std::sync::Arc;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    bucket::{BucketCounters, BucketValueMode, TimeBucket},
    classify::{ErrorDetail, ErrorTally},
    concurrency::RampUp,
    format::{self, DisplayZone, serialize_number},
    label::{AggregateRow, LabelSet},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Summary statistics for one run.
pub struct Report {
    /// Rows whose `success` column was exactly `"true"`.
    pub success_count: u64,
    /// All other accepted rows.
    pub error_count: u64,
    /// First timestamp of the run, empty when nothing was accepted.
    pub start_time: String,
    /// Last timestamp of the run, empty when nothing was accepted.
    pub end_time: String,
    /// Ramp-up summary.
    pub ramp_up_info: RampUpInfo,
    /// One row per label in first-seen order.
    pub aggregate_report: Vec<AggregateRow>,
    /// One row per second, ascending.
    pub time_series_data: Vec<TimeSeriesRow>,
    /// Global error breakdown, most frequent first.
    pub error_details: Vec<ErrorDetail>,
    /// Every label in first-seen order.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Ramp-up section of the report.
pub struct RampUpInfo {
    /// Peak concurrent users across all labels.
    pub users: u64,
    /// Peak concurrency of any single label.
    pub users_per_test: u64,
    /// Human readable ramp-up duration.
    pub duration: String,
    /// Epoch milliseconds at which ramp-up began.
    #[serde(skip)]
    pub start: Option<i64>,
    /// Epoch milliseconds at which the peak was first reached.
    #[serde(skip)]
    pub end: Option<i64>,
}

impl From<RampUp> for RampUpInfo {
    fn from(ramp: RampUp) -> Self {
        Self {
            users: ramp.users,
            users_per_test: ramp.users_per_test,
            duration: format::duration(ramp.duration_ms()),
            start: ramp.start,
            end: ramp.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One label's values in one time series row.
pub struct SeriesPoint {
    /// Label these values belong to.
    pub label: Arc<str>,
    /// Samples in the second.
    pub requests: u64,
    /// Explicit failures in the second.
    pub errors: u64,
    /// Explicit successes in the second.
    pub checks: u64,
    /// Peak concurrency in the second.
    pub active_threads: u64,
    /// Bytes received in the second.
    pub bytes: f64,
    /// Bytes sent in the second.
    pub sent_bytes: f64,
    /// Elapsed time, resolved per the run's [`BucketValueMode`].
    pub elapsed: f64,
    /// Latency, resolved per the run's [`BucketValueMode`].
    pub latency: f64,
    /// Error breakdown for the second.
    pub error_details: ErrorTally,
}

impl SeriesPoint {
    fn new(label: Arc<str>, counters: Option<&BucketCounters>, mode: BucketValueMode) -> Self {
        match counters {
            Some(c) => Self {
                label,
                requests: c.requests,
                errors: c.errors,
                checks: c.checks,
                active_threads: c.active_threads,
                bytes: c.bytes,
                sent_bytes: c.sent_bytes,
                elapsed: c.elapsed.get(mode),
                latency: c.latency.get(mode),
                error_details: c.error_details.clone(),
            },
            None => Self {
                label,
                requests: 0,
                errors: 0,
                checks: 0,
                active_threads: 0,
                bytes: 0.0,
                sent_bytes: 0.0,
                elapsed: 0.0,
                latency: 0.0,
                error_details: ErrorTally::default(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One second of the run.
///
/// Serializes flat: `time`, `originalTime`, then nine `<metric>_<label>` keys
/// per label.
pub struct TimeSeriesRow {
    /// Time of day of the bucket start.
    pub time: String,
    /// Epoch milliseconds of the bucket start.
    pub original_time: i64,
    /// Per-label values in label order.
    pub points: Vec<SeriesPoint>,
}

impl TimeSeriesRow {
    /// Values for `label`, if the label exists in the run.
    #[must_use]
    pub fn point(&self, label: &str) -> Option<&SeriesPoint> {
        self.points.iter().find(|p| &*p.label == label)
    }

    /// Concurrency summed across labels.
    #[must_use]
    pub fn total_active_threads(&self) -> u64 {
        self.points.iter().map(|p| p.active_threads).sum()
    }
}

struct Number(f64);

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_number(&self.0, serializer)
    }
}

impl Serialize for TimeSeriesRow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2 + self.points.len() * 9))?;
        map.serialize_entry("time", &self.time)?;
        map.serialize_entry("originalTime", &self.original_time)?;
        for p in &self.points {
            let label = &p.label;
            map.serialize_entry(&format!("requestsPerSecond_{label}"), &p.requests)?;
            map.serialize_entry(&format!("errorsPerSecond_{label}"), &p.errors)?;
            map.serialize_entry(&format!("activeThreads_{label}"), &p.active_threads)?;
            map.serialize_entry(&format!("bytes_{label}"), &Number(p.bytes))?;
            map.serialize_entry(&format!("sentBytes_{label}"), &Number(p.sent_bytes))?;
            map.serialize_entry(&format!("elapsed_{label}"), &Number(p.elapsed))?;
            map.serialize_entry(&format!("latency_{label}"), &Number(p.latency))?;
            map.serialize_entry(&format!("checksPerSecond_{label}"), &p.checks)?;
            map.serialize_entry(&format!("errorDetails_{label}"), &p.error_details)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Global counters of one run.
pub struct Totals {
    /// Rows with `success == "true"`.
    pub success: u64,
    /// Every other accepted row.
    pub errors: u64,
    /// Smallest accepted timestamp.
    pub first_timestamp: Option<i64>,
    /// Largest accepted timestamp.
    pub last_timestamp: Option<i64>,
}

#[derive(Debug)]
/// Finalized state of a run, ready for marshaling.
pub struct Finalized {
    /// Global counters.
    pub totals: Totals,
    /// Ramp-up window.
    pub ramp_up: RampUp,
    /// Per-label rows in label order.
    pub aggregate: Vec<AggregateRow>,
    /// Buckets in ascending key order.
    pub buckets: Vec<TimeBucket>,
    /// Labels of the run.
    pub labels: LabelSet,
    /// Global error breakdown.
    pub errors: Vec<ErrorDetail>,
}

/// Arrange finalized state into a [`Report`].
#[must_use]
pub fn assemble(state: Finalized, zone: DisplayZone, mode: BucketValueMode) -> Report {
    let Finalized {
        totals,
        ramp_up,
        aggregate,
        buckets,
        labels,
        errors,
    } = state;

    let time_series_data = buckets
        .iter()
        .map(|bucket| TimeSeriesRow {
            time: zone.time_of_day(bucket.key()),
            original_time: bucket.key(),
            points: labels
                .iter()
                .map(|(id, name)| SeriesPoint::new(Arc::clone(name), bucket.counters(id), mode))
                .collect(),
        })
        .collect();

    Report {
        success_count: totals.success,
        error_count: totals.errors,
        start_time: totals
            .first_timestamp
            .map(|ts| zone.date_time(ts))
            .unwrap_or_default(),
        end_time: totals
            .last_timestamp
            .map(|ts| zone.date_time(ts))
            .unwrap_or_default(),
        ramp_up_info: RampUpInfo::from(ramp_up),
        aggregate_report: aggregate,
        time_series_data,
        error_details: errors,
        labels: labels.names().iter().map(ToString::to_string).collect(),
    }
}
