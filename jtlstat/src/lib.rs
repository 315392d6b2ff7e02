//! The jtlstat load-test report tool.
//!
//! This library supports the jtlstat binary found elsewhere in this project:
//! configuration parsing and input decoding. The aggregation itself lives in
//! `jtlstat_engine`.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;

use jtlstat_engine::{Analysis, CancellationToken, Options};

pub mod config;
pub mod input;

/// Errors produced by [`analyze_file`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input could not be opened.
    #[error(transparent)]
    Input(#[from] input::Error),
    /// The run failed.
    #[error(transparent)]
    Engine(#[from] jtlstat_engine::Error),
}

/// Open the sample log at `path` and run it through a fresh engine.
///
/// # Errors
///
/// Returns an error if the input cannot be opened, fails mid-stream or if the
/// run is cancelled.
pub fn analyze_file(
    path: &Path,
    config: &config::Config,
    options: Options,
    cancel: &CancellationToken,
) -> Result<Analysis, Error> {
    let rows = input::open(path, config.input_format, config.large_file_warning_bytes)?;
    Ok(jtlstat_engine::analyze(rows, options, cancel)?)
}
