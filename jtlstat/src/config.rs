//! This module controls configuration parsing from the end user. Every field
//! has a default so an absent or empty file is a valid configuration.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use jtlstat_engine::{
    Options,
    bucket::BucketValueMode,
    classify::UNSPECIFIED_ERROR,
    format::{DisplayZone, ZoneParseError},
};
use serde::Deserialize;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The configured display offset could not be understood
    #[error("Invalid utc_offset: {0}")]
    UtcOffset(#[from] ZoneParseError),
}

/// How the input file is to be decoded.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// Decide from magic bytes and file extension.
    #[default]
    Auto,
    /// Comma separated values with a header row.
    Csv,
    /// One JSON object per line.
    Jsonl,
}

/// Output settings.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Output {
    /// Pretty-print the report JSON.
    #[serde(default)]
    pub pretty: bool,
}

fn default_utc_offset() -> String {
    "utc".to_string()
}

fn default_unspecified_error_message() -> String {
    UNSPECIFIED_ERROR.to_string()
}

fn default_large_file_warning_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Main configuration struct for this program
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Input decoding, `auto` by default.
    #[serde(default)]
    pub input_format: InputFormat,
    /// Offset in which time labels are rendered. Also accepts `utc` and
    /// `local`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// How per-second elapsed and latency are reported.
    #[serde(default)]
    pub bucket_values: BucketValueMode,
    /// Message for failures whose response code has no known message.
    #[serde(default = "default_unspecified_error_message")]
    pub unspecified_error_message: String,
    /// Inputs larger than this many bytes log a warning before processing.
    #[serde(default = "default_large_file_warning_bytes")]
    pub large_file_warning_bytes: u64,
    /// Output settings.
    #[serde(default)]
    pub output: Output,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_format: InputFormat::default(),
            utc_offset: default_utc_offset(),
            bucket_values: BucketValueMode::default(),
            unspecified_error_message: default_unspecified_error_message(),
            large_file_warning_bytes: default_large_file_warning_bytes(),
            output: Output::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from YAML text. Empty text yields the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML for this structure.
    pub fn parse(contents: &str) -> Result<Self, Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Self::parse(&contents)
    }

    /// Engine options described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `utc_offset` is not understood.
    pub fn to_options(&self) -> Result<Options, Error> {
        Ok(Options {
            zone: self.utc_offset.parse::<DisplayZone>()?,
            bucket_values: self.bucket_values,
            unspecified_error_message: self.unspecified_error_message.clone(),
        })
    }
}
