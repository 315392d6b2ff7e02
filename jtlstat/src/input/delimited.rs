//! CSV decoding. Columns are matched by header name and record lengths may
//! vary. Header names are trimmed, field values are kept verbatim.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use jtlstat_engine::RawRow;
use tracing::debug;

use super::Error;

pub(super) struct CsvRows<R: Read> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    record: StringRecord,
    line: u64,
}

impl<R: Read> CsvRows<R> {
    pub(super) fn new(reader: R) -> Result<Self, Error> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(reader);
        let headers = reader.headers().map_err(Error::Header)?.clone();
        debug!(columns = headers.len(), "read CSV header");
        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            line: 1,
        })
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<RawRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line += 1;
        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => Some(Ok(self
                .headers
                .iter()
                .zip(self.record.iter())
                .collect())),
            Err(err) if err.is_io_error() => Some(Err(Error::Csv(err))),
            Err(err) => {
                debug!(line = self.line, %err, "skipping undecodable CSV row");
                Some(Ok(RawRow::new()))
            }
        }
    }
}
