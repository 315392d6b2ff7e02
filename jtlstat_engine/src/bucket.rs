//! One-second time buckets.
//!
//! Every sample lands in the bucket keyed `floor(timestamp / 1000) * 1000`.
//! A bucket keeps one [`BucketCounters`] slot per label. When a bucket is
//! created it gets zeroed slots for every label known at that moment. Labels
//! first seen later are not added to buckets that already exist; if such a
//! label later produces a sample inside an old bucket its slot is created on
//! demand. Reports still print every label for every bucket, with zeros where
//! the slot is absent.
//!
//! Buckets are kept in a hash map during ingestion. Order only matters at
//! [`TimeBucketIndex::into_sorted`].

use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    classify::{ErrorKey, ErrorTally},
    label::LabelId,
    record::SampleRecord,
};

/// Width of a bucket in milliseconds.
pub const BUCKET_MS: i64 = 1_000;

/// Key of the bucket containing `timestamp`. Floors toward negative infinity
/// so that pre-epoch timestamps bucket consistently.
#[must_use]
pub fn bucket_key(timestamp: i64) -> i64 {
    timestamp.div_euclid(BUCKET_MS) * BUCKET_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How a bucket reports per-label elapsed and latency.
pub enum BucketValueMode {
    /// The value of the last sample written to the bucket. This reproduces
    /// reports produced by earlier tooling but is sensitive to input order
    /// and hides everything but one sample per second.
    #[default]
    LastWrite,
    /// Mean of every sample written to the bucket.
    Mean,
}

/// Errors produced when parsing a [`BucketValueMode`].
#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown bucket value mode {0:?}, expected 'last-write' or 'mean'")]
pub struct ModeParseError(String);

impl FromStr for BucketValueMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-write" | "last_write" => Ok(BucketValueMode::LastWrite),
            "mean" => Ok(BucketValueMode::Mean),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// A per-bucket value that can be reported either as last-written or as
/// mean.
pub struct BucketValue {
    last: f64,
    sum: f64,
    samples: u64,
}

impl BucketValue {
    fn write(&mut self, value: f64) {
        self.last = value;
        self.sum += value;
        self.samples += 1;
    }

    /// Resolve according to `mode`.
    #[must_use]
    pub fn get(&self, mode: BucketValueMode) -> f64 {
        match mode {
            BucketValueMode::LastWrite => self.last,
            BucketValueMode::Mean if self.samples == 0 => 0.0,
            BucketValueMode::Mean => self.sum / self.samples as f64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Counters for one label within one bucket.
pub struct BucketCounters {
    /// Samples in this bucket.
    pub requests: u64,
    /// Explicit failures in this bucket.
    pub errors: u64,
    /// Explicit successes in this bucket.
    pub checks: u64,
    /// Highest concurrency seen in this bucket.
    pub active_threads: u64,
    /// Bytes received, summed.
    pub bytes: f64,
    /// Bytes sent, summed.
    pub sent_bytes: f64,
    /// Elapsed time.
    pub elapsed: BucketValue,
    /// Latency.
    pub latency: BucketValue,
    /// Error keys of explicit failures.
    pub error_details: ErrorTally,
}

#[derive(Debug, Clone)]
/// A single one-second window.
pub struct TimeBucket {
    key: i64,
    slots: Vec<Option<BucketCounters>>,
}

impl TimeBucket {
    fn new(key: i64, known_labels: usize) -> Self {
        Self {
            key,
            slots: vec![Some(BucketCounters::default()); known_labels],
        }
    }

    /// Epoch milliseconds at which this bucket starts.
    #[must_use]
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Counters for `label`, `None` if the label has no slot in this bucket.
    #[must_use]
    pub fn counters(&self, label: LabelId) -> Option<&BucketCounters> {
        self.slots.get(label.index()).and_then(Option::as_ref)
    }

    fn slot(&mut self, label: LabelId) -> &mut BucketCounters {
        let idx = label.index();
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx].get_or_insert_with(BucketCounters::default)
    }
}

#[derive(Debug, Default)]
/// All buckets of one run.
pub struct TimeBucketIndex {
    buckets: FxHashMap<i64, TimeBucket>,
}

impl TimeBucketIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `record` under `label`. `known_labels` is the number of labels
    /// interned so far, the current one included, and sizes newly created
    /// buckets. `error` is the classified key when the record is an explicit
    /// failure.
    pub fn update(
        &mut self,
        record: &SampleRecord,
        label: LabelId,
        known_labels: usize,
        error: Option<&ErrorKey>,
    ) {
        let key = bucket_key(record.timestamp);
        let slot = self
            .buckets
            .entry(key)
            .or_insert_with(|| TimeBucket::new(key, known_labels))
            .slot(label);

        slot.requests += 1;
        if record.outcome.is_success() {
            slot.checks += 1;
        }
        if record.outcome.is_failure() {
            slot.errors += 1;
        }
        if let Some(key) = error {
            slot.error_details.record(key);
        }
        slot.active_threads = slot.active_threads.max(record.concurrency);
        slot.bytes += record.bytes_received;
        slot.sent_bytes += record.bytes_sent;
        slot.elapsed.write(record.elapsed_ms);
        slot.latency.write(record.latency_ms);
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Look up the bucket containing `timestamp`.
    #[must_use]
    pub fn get(&self, timestamp: i64) -> Option<&TimeBucket> {
        self.buckets.get(&bucket_key(timestamp))
    }

    /// Drain into buckets ordered by ascending key.
    #[must_use]
    pub fn into_sorted(self) -> Vec<TimeBucket> {
        let mut buckets: Vec<TimeBucket> = self.buckets.into_values().collect();
        buckets.sort_unstable_by_key(TimeBucket::key);
        buckets
    }
}
