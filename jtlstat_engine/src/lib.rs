//! Aggregation engine for load-test sample logs.
//!
//! Each sampled request of a load test -- a JTL row -- is normalized into a
//! [`record::SampleRecord`] and fanned out to four independent accumulators:
//! per-label statistics, one-second time buckets, a concurrency tracker and an
//! error classifier. Once the input is exhausted the accumulators are drained
//! into a [`report::Report`].
//!
//! All state lives in an [`engine::Engine`] owned by exactly one run. There
//! are no globals: two runs over two inputs never observe one another.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod bucket;
pub mod classify;
pub mod concurrency;
pub mod engine;
pub mod format;
pub mod label;
pub mod record;
pub mod report;
pub mod summary;

pub use engine::{Analysis, Engine, Error, IngestStats, Options, analyze};
pub use record::{RawRow, RawValue, SampleRecord};
pub use report::Report;
pub use tokio_util::sync::CancellationToken;
