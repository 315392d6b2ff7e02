//! JSON lines decoding, one object per line. Blank lines are skipped.

use std::io::BufRead;

use jtlstat_engine::RawRow;
use tracing::debug;

use super::Error;

pub(super) struct JsonlRows<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line: u64,
}

impl<R: BufRead> JsonlRows<R> {
    pub(super) fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(512),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for JsonlRows<R> {
    type Item = Result<RawRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(Error::Io(err))),
            }
            self.line += 1;
            if self.buffer.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // Raw bytes go to serde_json so that invalid UTF-8 is a malformed
            // row, not a read failure.
            return match serde_json::from_slice::<RawRow>(&self.buffer) {
                Ok(row) => Some(Ok(row)),
                Err(err) => {
                    debug!(line = self.line, %err, "skipping malformed JSON line");
                    Some(Ok(RawRow::new()))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use jtlstat_engine::RawValue;

    use super::*;

    fn decode(input: &[u8]) -> Vec<RawRow> {
        JsonlRows::new(input)
            .collect::<Result<_, _>>()
            .expect("rows")
    }

    #[test]
    fn objects_per_line() {
        let rows = decode(
            b"{\"timeStamp\":1000,\"label\":\"a\",\"elapsed\":\"12\"}\n\n  \n{\"timeStamp\":\"2000\",\"success\":false}",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("timeStamp"), Some(&RawValue::Number(1000.0)));
        assert_eq!(rows[0].get("elapsed"), Some(&RawValue::from("12")));
        assert_eq!(rows[1].get("success"), Some(&RawValue::Bool(false)));
    }

    #[test]
    fn malformed_lines_become_empty_rows() {
        let rows = decode(b"not json\n{\"label\":\xff}\n{\"timeStamp\":1}\n[1,2]\n");
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty());
        assert!(rows[1].is_empty());
        assert_eq!(rows[2].len(), 1);
        assert!(rows[3].is_empty());
    }

    #[test]
    fn nulls_are_kept() {
        let rows = decode(b"{\"timeStamp\":1000,\"responseCode\":null}\n");
        assert_eq!(rows[0].get("responseCode"), Some(&RawValue::Null));
    }
}
