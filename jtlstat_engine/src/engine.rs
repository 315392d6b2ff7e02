//! Run driver.
//!
//! An [`Engine`] owns every accumulator of one run. Rows are fed one at a
//! time through [`Engine::ingest`], each accepted row is fanned out to all
//! accumulators, and [`Engine::finish`] drains them into a [`Report`]. Engines
//! are never shared between runs.

use std::sync::Arc;

use metrics::{counter, gauge};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    bucket::{BucketValueMode, TimeBucketIndex},
    classify::{ErrorClassifier, UNSPECIFIED_ERROR},
    concurrency::ConcurrencyTracker,
    format::DisplayZone,
    label::{LabelAccumulator, LabelSet},
    record::{self, RawRow, SampleRecord},
    report::{self, Finalized, Report, Totals},
};

/// Errors produced by [`analyze`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The row source failed before it was exhausted.
    #[error("input unreadable: {source}")]
    InputUnreadable {
        /// Underlying source error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The run was cancelled before the input was exhausted.
    #[error("run cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
/// Knobs of a single run.
pub struct Options {
    /// Zone in which time labels are rendered.
    pub zone: DisplayZone,
    /// How per-bucket elapsed and latency are reported.
    pub bucket_values: BucketValueMode,
    /// Message given to failures whose code has no known message.
    pub unspecified_error_message: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            zone: DisplayZone::default(),
            bucket_values: BucketValueMode::default(),
            unspecified_error_message: UNSPECIFIED_ERROR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Row counts of one run.
pub struct IngestStats {
    /// Rows that produced a sample.
    pub accepted: u64,
    /// Rows dropped for lack of a usable timestamp.
    pub rejected: u64,
}

#[derive(Debug, Clone, PartialEq)]
/// Result of [`analyze`].
pub struct Analysis {
    /// The report.
    pub report: Report,
    /// Row counts.
    pub stats: IngestStats,
}

#[derive(Debug)]
/// State of one run.
pub struct Engine {
    options: Options,
    labels: LabelSet,
    per_label: Vec<LabelAccumulator>,
    buckets: TimeBucketIndex,
    concurrency: ConcurrencyTracker,
    errors: ErrorClassifier,
    totals: Totals,
    stats: IngestStats,
}

impl Engine {
    /// Create an engine with no observed rows.
    #[must_use]
    pub fn new(options: Options) -> Self {
        let errors = ErrorClassifier::new(&options.unspecified_error_message);
        Self {
            options,
            labels: LabelSet::default(),
            per_label: Vec::new(),
            buckets: TimeBucketIndex::new(),
            concurrency: ConcurrencyTracker::new(),
            errors,
            totals: Totals::default(),
            stats: IngestStats::default(),
        }
    }

    /// Validate `raw` and, if it is usable, fold it into the run. Returns
    /// whether the row was accepted.
    pub fn ingest(&mut self, raw: &RawRow) -> bool {
        if let Some(record) = record::validate(raw) {
            self.observe(&record);
            true
        } else {
            self.stats.rejected += 1;
            counter!("rows_rejected").increment(1);
            debug!(
                row = self.stats.accepted + self.stats.rejected,
                columns = raw.len(),
                "skipping row without a usable timestamp"
            );
            false
        }
    }

    /// Fold a validated record into the run.
    fn observe(&mut self, record: &SampleRecord) {
        self.stats.accepted += 1;
        counter!("rows_accepted").increment(1);

        let (id, new) = self.labels.intern(&record.label);
        if new {
            debug!(label = %record.label, "new label");
            self.per_label
                .push(LabelAccumulator::new(Arc::clone(self.labels.name(id))));
        }
        self.per_label[id.index()].update(record);

        if record.outcome.is_success() {
            self.totals.success += 1;
        } else {
            self.totals.errors += 1;
        }
        self.totals.first_timestamp = Some(
            self.totals
                .first_timestamp
                .map_or(record.timestamp, |ts| ts.min(record.timestamp)),
        );
        self.totals.last_timestamp = Some(
            self.totals
                .last_timestamp
                .map_or(record.timestamp, |ts| ts.max(record.timestamp)),
        );

        // Global table and bucket tally share one key so they cannot diverge.
        let error = if record.outcome.is_failure() {
            let key = self.errors.classify(
                record.response_code.as_deref(),
                record.response_message.as_deref(),
            );
            self.errors.record(&key);
            Some(key)
        } else {
            None
        };
        self.buckets
            .update(record, id, self.labels.len(), error.as_ref());
        self.concurrency
            .observe(record.timestamp, id, record.concurrency);
    }

    /// Row counts so far.
    #[must_use]
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Drain every accumulator into the report.
    #[must_use]
    pub fn finish(self) -> Report {
        let run_ms = match (self.totals.first_timestamp, self.totals.last_timestamp) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        let run_seconds = run_ms as f64 / 1_000.0;

        gauge!("labels_seen").set(self.labels.len() as f64);
        info!(
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            labels = self.labels.len(),
            buckets = self.buckets.len(),
            failures = self.errors.total(),
            "run finished"
        );

        let ramp_up = self.concurrency.finalize();
        let aggregate = self
            .per_label
            .into_iter()
            .map(|acc| acc.finalize(run_seconds))
            .collect();

        report::assemble(
            Finalized {
                totals: self.totals,
                ramp_up,
                aggregate,
                buckets: self.buckets.into_sorted(),
                labels: self.labels,
                errors: self.errors.finalize(),
            },
            self.options.zone,
            self.options.bucket_values,
        )
    }
}

/// Drive `rows` through a fresh [`Engine`] and produce the report.
///
/// The cancel token is polled before every row.
///
/// # Errors
///
/// Returns [`Error::InputUnreadable`] as soon as the source yields an error
/// and [`Error::Cancelled`] if `cancel` fires. No partial report is produced
/// in either case.
pub fn analyze<I, E>(
    rows: I,
    options: Options,
    cancel: &CancellationToken,
) -> Result<Analysis, Error>
where
    I: IntoIterator<Item = Result<RawRow, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut engine = Engine::new(options);
    info!(
        zone = %engine.options.zone,
        bucket_values = ?engine.options.bucket_values,
        "run started"
    );

    for row in rows {
        if cancel.is_cancelled() {
            warn!(
                accepted = engine.stats.accepted,
                rejected = engine.stats.rejected,
                "run cancelled, discarding partial state"
            );
            return Err(Error::Cancelled);
        }
        let row = row.map_err(|source| Error::InputUnreadable {
            source: Box::new(source),
        })?;
        engine.ingest(&row);
    }

    let stats = engine.stats();
    Ok(Analysis {
        report: engine.finish(),
        stats,
    })
}
