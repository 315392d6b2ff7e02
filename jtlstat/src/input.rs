//! Input decoding.
//!
//! A sample log is opened, sniffed for zstd compression and handed to either
//! the CSV or the JSON lines decoder. Both decoders yield one
//! [`RawRow`](jtlstat_engine::RawRow) per input line. A line that cannot be
//! decoded is yielded as an empty row, which the engine counts as rejected.
//! Only failures of the underlying reader end the stream with an error.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use jtlstat_engine::RawRow;
use tracing::{info, warn};

use crate::config::InputFormat;

mod delimited;
mod jsonl;

/// First four bytes of every zstd frame.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Errors produced while decoding input.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error opening the input file
    #[error("Failed to open input {path:?}: {source}")]
    Open {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// Error reading from the input
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),
    /// The CSV header could not be read
    #[error("Failed to read CSV header: {0}")]
    Header(#[source] csv::Error),
    /// The CSV reader failed mid-stream
    #[error("Failed to read CSV input: {0}")]
    Csv(#[source] csv::Error),
    /// The zstd decoder could not be constructed
    #[error("Failed to initialize zstd decoder: {0}")]
    Zstd(#[source] io::Error),
}

/// Line format of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Comma separated values with a header row.
    Csv,
    /// One JSON object per line.
    Jsonl,
}

/// Result of format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detected {
    /// Line format after decompression.
    pub format: Format,
    /// Whether the input is zstd compressed.
    pub compressed: bool,
}

fn extension_is(path: &Path, candidates: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| candidates.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

/// Decide how to decode `path` given its first bytes `head`.
///
/// Compression is detected from the zstd magic or a `.zst`/`.zstd`
/// extension. The line format comes from `forced` unless it is
/// [`InputFormat::Auto`], in which case `.jsonl` and `.ndjson` files -- before
/// any compression suffix -- are JSON lines and everything else is CSV.
#[must_use]
pub fn detect_format(path: &Path, head: &[u8], forced: InputFormat) -> Detected {
    let by_extension = extension_is(path, &["zst", "zstd"]);
    let compressed = head.starts_with(&ZSTD_MAGIC) || by_extension;

    let inner = if by_extension {
        path.file_stem().map_or_else(PathBuf::new, PathBuf::from)
    } else {
        path.to_path_buf()
    };
    let format = match forced {
        InputFormat::Csv => Format::Csv,
        InputFormat::Jsonl => Format::Jsonl,
        InputFormat::Auto if extension_is(&inner, &["jsonl", "ndjson"]) => Format::Jsonl,
        InputFormat::Auto => Format::Csv,
    };

    Detected { format, compressed }
}

/// Iterator over the rows of one input.
pub struct Rows {
    inner: Inner,
}

enum Inner {
    Csv(delimited::CsvRows<Box<dyn Read + Send>>),
    Jsonl(jsonl::JsonlRows<BufReader<Box<dyn Read + Send>>>),
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let format = match self.inner {
            Inner::Csv(_) => Format::Csv,
            Inner::Jsonl(_) => Format::Jsonl,
        };
        f.debug_struct("Rows").field("format", &format).finish()
    }
}

impl Rows {
    /// Decode rows from `reader` in the given `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if a CSV header cannot be read.
    pub fn from_reader(reader: Box<dyn Read + Send>, format: Format) -> Result<Self, Error> {
        let inner = match format {
            Format::Csv => Inner::Csv(delimited::CsvRows::new(reader)?),
            Format::Jsonl => Inner::Jsonl(jsonl::JsonlRows::new(BufReader::new(reader))),
        };
        Ok(Self { inner })
    }
}

impl Iterator for Rows {
    type Item = Result<RawRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Csv(rows) => rows.next(),
            Inner::Jsonl(rows) => rows.next(),
        }
    }
}

/// Open `path` for decoding.
///
/// Inputs larger than `large_file_warning_bytes` are logged at warn level.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read, if the zstd decoder
/// cannot be constructed or if a CSV header cannot be read.
pub fn open(path: &Path, forced: InputFormat, large_file_warning_bytes: u64) -> Result<Rows, Error> {
    let open_error = |source| Error::Open {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let file = File::open(path).map_err(open_error)?;
    let bytes = file.metadata().map_err(open_error)?.len();
    if bytes > large_file_warning_bytes {
        warn!(
            path = %path.display(),
            bytes,
            threshold = large_file_warning_bytes,
            "large input, processing may take a while"
        );
    }

    let mut reader = BufReader::new(file);
    let detected = detect_format(path, reader.fill_buf()?, forced);
    info!(
        path = %path.display(),
        bytes,
        format = ?detected.format,
        compressed = detected.compressed,
        "opened input"
    );

    let reader: Box<dyn Read + Send> = if detected.compressed {
        Box::new(zstd::stream::read::Decoder::with_buffer(reader).map_err(Error::Zstd)?)
    } else {
        Box::new(reader)
    };
    Rows::from_reader(reader, detected.format)
}
