//! Per-label running statistics.
//!
//! Labels are interned into a [`LabelSet`] on first sight and referred to by
//! [`LabelId`] afterward. Each label owns a [`LabelAccumulator`] holding
//! running sums plus the raw elapsed and latency samples. Samples are appended
//! as they arrive and sorted exactly once, at [`LabelAccumulator::finalize`],
//! which is what makes the percentiles exact.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{
    format::{round2, serialize_number},
    record::SampleRecord,
};

/// Dense handle to an interned label. Handles are assigned in first-seen
/// order starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(usize);

impl LabelId {
    /// Index of this label in first-seen order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Growing, insertion-ordered set of labels.
#[derive(Debug, Default, Clone)]
pub struct LabelSet {
    names: Vec<Arc<str>>,
    lookup: FxHashMap<Arc<str>, LabelId>,
}

impl LabelSet {
    /// Return the handle for `name`, interning it if unseen. The boolean is
    /// true when the label was new.
    pub fn intern(&mut self, name: &str) -> (LabelId, bool) {
        if let Some(&id) = self.lookup.get(name) {
            return (id, false);
        }
        let id = LabelId(self.names.len());
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.lookup.insert(name, id);
        (id, true)
    }

    /// Look up an already interned label.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<LabelId> {
        self.lookup.get(name).copied()
    }

    /// Name of the label behind `id`.
    #[must_use]
    pub fn name(&self, id: LabelId) -> &Arc<str> {
        &self.names[id.index()]
    }

    /// Number of labels seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no label has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label names in first-seen order.
    #[must_use]
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Iterate over `(id, name)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &Arc<str>)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (LabelId(idx), name))
    }
}

/// Upper median of an ascending slice: `sorted[n / 2]`, `0` when empty.
#[must_use]
pub fn upper_median(sorted: &[f64]) -> f64 {
    sorted.get(sorted.len() / 2).copied().unwrap_or(0.0)
}

/// Floor-indexed percentile of an ascending slice: `sorted[floor(n * q)]`.
/// Returns `0` when the index is out of range or the slice is empty.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (sorted.len() as f64 * q).floor() as usize;
    sorted.get(rank).copied().unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Final statistics for one label.
pub struct AggregateRow {
    /// The label.
    pub label: String,
    /// Mean elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub average: f64,
    /// Upper-median elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub median: f64,
    /// 90th percentile elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub p90: f64,
    /// 95th percentile elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub p95: f64,
    /// Minimum elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub min: f64,
    /// Maximum elapsed time.
    #[serde(serialize_with = "serialize_number")]
    pub max: f64,
    /// Failed samples as a percentage of all samples.
    #[serde(serialize_with = "serialize_number")]
    pub error_rate: f64,
    /// Samples per second over the whole run.
    #[serde(serialize_with = "serialize_number")]
    pub throughput: f64,
    /// Number of samples.
    pub count: u64,
    /// Mean latency.
    #[serde(serialize_with = "serialize_number")]
    pub average_latency: f64,
    /// Upper-median latency.
    #[serde(serialize_with = "serialize_number")]
    pub median_latency: f64,
    /// Mean bytes received per sample.
    #[serde(serialize_with = "serialize_number")]
    pub bytes: f64,
    /// Mean bytes sent per sample.
    #[serde(serialize_with = "serialize_number")]
    pub sent_bytes: f64,
}

/// Running aggregate for a single label.
#[derive(Debug, Clone)]
pub struct LabelAccumulator {
    label: Arc<str>,
    count: u64,
    errors: u64,
    total_elapsed: f64,
    total_latency: f64,
    total_bytes: f64,
    total_sent_bytes: f64,
    min_elapsed: f64,
    max_elapsed: f64,
    elapsed_samples: Vec<f64>,
    latency_samples: Vec<f64>,
}

impl LabelAccumulator {
    /// Create an empty accumulator for `label`.
    #[must_use]
    pub fn new(label: Arc<str>) -> Self {
        Self {
            label,
            count: 0,
            errors: 0,
            total_elapsed: 0.0,
            total_latency: 0.0,
            total_bytes: 0.0,
            total_sent_bytes: 0.0,
            min_elapsed: f64::INFINITY,
            max_elapsed: f64::NEG_INFINITY,
            elapsed_samples: Vec::new(),
            latency_samples: Vec::new(),
        }
    }

    /// Fold one sample into the aggregate.
    pub fn update(&mut self, record: &SampleRecord) {
        self.count += 1;
        if record.outcome.is_failure() {
            self.errors += 1;
        }
        self.total_elapsed += record.elapsed_ms;
        self.total_latency += record.latency_ms;
        self.total_bytes += record.bytes_received;
        self.total_sent_bytes += record.bytes_sent;
        self.min_elapsed = self.min_elapsed.min(record.elapsed_ms);
        self.max_elapsed = self.max_elapsed.max(record.elapsed_ms);
        self.elapsed_samples.push(record.elapsed_ms);
        self.latency_samples.push(record.latency_ms);
    }

    /// The label this accumulator belongs to.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Samples seen so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Explicit failures seen so far.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Sort the sample buffers and compute the label's statistics.
    ///
    /// `run_seconds` is the span of the whole run, used for throughput. A
    /// zero span is treated as one second. A label with no samples reports
    /// zero everywhere.
    #[must_use]
    pub fn finalize(mut self, run_seconds: f64) -> AggregateRow {
        self.elapsed_samples.sort_unstable_by(f64::total_cmp);
        self.latency_samples.sort_unstable_by(f64::total_cmp);

        let ratio = |numerator: f64| {
            if self.count == 0 {
                0.0
            } else {
                numerator / self.count as f64
            }
        };
        let span = if run_seconds > 0.0 { run_seconds } else { 1.0 };
        let (min, max) = if self.count == 0 {
            (0.0, 0.0)
        } else {
            (self.min_elapsed, self.max_elapsed)
        };

        AggregateRow {
            label: self.label.to_string(),
            average: round2(ratio(self.total_elapsed)),
            median: round2(upper_median(&self.elapsed_samples)),
            p90: round2(percentile(&self.elapsed_samples, 0.9)),
            p95: round2(percentile(&self.elapsed_samples, 0.95)),
            min: round2(min),
            max: round2(max),
            error_rate: round2(ratio(self.errors as f64) * 100.0),
            throughput: round2(self.count as f64 / span),
            count: self.count,
            average_latency: round2(ratio(self.total_latency)),
            median_latency: round2(upper_median(&self.latency_samples)),
            bytes: round2(ratio(self.total_bytes)),
            sent_bytes: round2(ratio(self.total_sent_bytes)),
        }
    }
}
