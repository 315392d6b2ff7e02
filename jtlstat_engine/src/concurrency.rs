//! Concurrency tracking and ramp-up detection.
//!
//! Two views are kept. Per label, the highest thread count ever observed.
//! Per raw timestamp -- not per bucket -- the highest thread count each label
//! reported at that instant. Summing the latter across labels gives the
//! number of concurrent users at an instant, from which the ramp-up window
//! is derived: it opens at the first instant with any users and closes at
//! the first instant the run's peak is reached.

use rustc_hash::FxHashMap;

use crate::label::LabelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Result of ramp-up detection.
pub struct RampUp {
    /// Peak of concurrent users summed across labels at a single instant.
    pub users: u64,
    /// Highest concurrency reported by any single label.
    pub users_per_test: u64,
    /// First instant with any users, `None` when no sample had concurrency.
    pub start: Option<i64>,
    /// First instant at which `users` was reached.
    pub end: Option<i64>,
}

impl RampUp {
    /// Milliseconds from ramp start to ramp end, `0` when undefined.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => (end - start).max(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
/// Concurrency state for one run.
pub struct ConcurrencyTracker {
    max_per_label: FxHashMap<LabelId, u64>,
    // Few labels report at any one instant, a vector beats a map here.
    at_timestamp: FxHashMap<i64, Vec<(LabelId, u64)>>,
}

impl ConcurrencyTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `label` reported `concurrency` threads at `timestamp`.
    /// Zero concurrency is ignored.
    pub fn observe(&mut self, timestamp: i64, label: LabelId, concurrency: u64) {
        if concurrency == 0 {
            return;
        }

        let peak = self.max_per_label.entry(label).or_insert(0);
        *peak = (*peak).max(concurrency);

        let instant = self.at_timestamp.entry(timestamp).or_default();
        match instant.iter_mut().find(|(l, _)| *l == label) {
            Some((_, threads)) => *threads = (*threads).max(concurrency),
            None => instant.push((label, concurrency)),
        }
    }

    /// Highest concurrency `label` ever reported.
    #[must_use]
    pub fn max_for(&self, label: LabelId) -> u64 {
        self.max_per_label.get(&label).copied().unwrap_or(0)
    }

    /// Derive the ramp-up window.
    #[must_use]
    pub fn finalize(&self) -> RampUp {
        let mut totals: Vec<(i64, u64)> = self
            .at_timestamp
            .iter()
            .map(|(ts, labels)| (*ts, labels.iter().map(|(_, threads)| threads).sum()))
            .collect();
        totals.sort_unstable_by_key(|(ts, _)| *ts);

        let users = totals.iter().map(|(_, total)| *total).max().unwrap_or(0);
        let start = totals
            .iter()
            .find(|(_, total)| *total > 0)
            .map(|(ts, _)| *ts);
        let end = totals
            .iter()
            .find(|(_, total)| users > 0 && *total == users)
            .map(|(ts, _)| *ts);

        RampUp {
            users,
            users_per_test: self.max_per_label.values().copied().max().unwrap_or(0),
            start,
            end,
        }
    }
}
