//! Error classification.
//!
//! Every failed sample is reduced to an [`ErrorKey`], a `(code, message)`
//! pair rendered as `"{code}: {message}"`. The same key is tallied twice: once
//! globally by [`ErrorClassifier`] and once in the time bucket the sample
//! landed in, via [`ErrorTally`]. Both sites receive the key produced by one
//! call to [`ErrorClassifier::classify`] so they can never disagree.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer, ser::SerializeMap};

/// Code used when a failed sample carries no response code.
pub const DEFAULT_CODE: &str = "000";

/// Message used when neither the sample nor the HTTP table provide one.
pub const UNSPECIFIED_ERROR: &str = "Erro não especificado";

const HTTP_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("400", "Bad Request"),
    ("401", "Unauthorized"),
    ("403", "Forbidden"),
    ("404", "Not Found"),
    ("429", "Too Many Requests"),
    ("500", "Internal Server Error"),
    ("502", "Bad Gateway"),
    ("503", "Service Unavailable"),
    ("504", "Gateway Timeout"),
];

/// Look up the canonical message for an HTTP status code.
#[must_use]
pub fn http_message(code: &str) -> Option<&'static str> {
    HTTP_ERROR_MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Stable identity of one kind of error.
pub struct ErrorKey {
    code: String,
    message: String,
}

impl ErrorKey {
    /// The response code part of the key.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The message part of the key.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One line of the global error breakdown.
pub struct ErrorDetail {
    /// Response code.
    pub code: String,
    /// Response message.
    pub message: String,
    /// Number of failed samples with this code and message.
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Insertion-ordered error counts for a single bucket and label.
///
/// Buckets see few distinct errors so lookups are a linear scan.
pub struct ErrorTally {
    counts: Vec<(ErrorKey, u64)>,
}

impl ErrorTally {
    /// Count one occurrence of `key`.
    pub fn record(&mut self, key: &ErrorKey) {
        if let Some((_, count)) = self.counts.iter_mut().find(|(k, _)| k == key) {
            *count += 1;
        } else {
            self.counts.push((key.clone(), 1));
        }
    }

    /// Occurrences of `key` so far.
    #[must_use]
    pub fn count(&self, key: &ErrorKey) -> u64 {
        self.counts
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, count)| *count)
    }

    /// Whether no error has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over `(key, count)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorKey, u64)> {
        self.counts.iter().map(|(k, c)| (k, *c))
    }
}

impl Serialize for ErrorTally {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (key, count) in &self.counts {
            map.serialize_entry(&key.to_string(), count)?;
        }
        map.end()
    }
}

#[derive(Debug)]
/// Global error frequency table for one run.
pub struct ErrorClassifier {
    unspecified: String,
    index: FxHashMap<ErrorKey, usize>,
    counts: Vec<(ErrorKey, u64)>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(UNSPECIFIED_ERROR)
    }
}

impl ErrorClassifier {
    /// Create a classifier that falls back to `unspecified` when no message
    /// can be found for a code.
    #[must_use]
    pub fn new(unspecified: &str) -> Self {
        Self {
            unspecified: unspecified.to_string(),
            index: FxHashMap::default(),
            counts: Vec::new(),
        }
    }

    /// Build the key for a failed sample. Empty strings count as absent.
    #[must_use]
    pub fn classify(&self, code: Option<&str>, message: Option<&str>) -> ErrorKey {
        let code = code.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CODE);
        let message = message
            .filter(|m| !m.is_empty())
            .or_else(|| http_message(code))
            .unwrap_or(&self.unspecified);
        ErrorKey {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Count one occurrence of `key`.
    pub fn record(&mut self, key: &ErrorKey) {
        if let Some(&slot) = self.index.get(key) {
            self.counts[slot].1 += 1;
        } else {
            self.index.insert(key.clone(), self.counts.len());
            self.counts.push((key.clone(), 1));
        }
    }

    /// Total failures recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Drain into the error breakdown: descending by count, ties in
    /// first-seen order.
    #[must_use]
    pub fn finalize(self) -> Vec<ErrorDetail> {
        let mut details: Vec<ErrorDetail> = self
            .counts
            .into_iter()
            .map(|(key, count)| ErrorDetail {
                code: key.code,
                message: key.message,
                count,
            })
            .collect();
        // `sort_by` is stable, equal counts keep insertion order.
        details.sort_by(|a, b| b.count.cmp(&a.count));
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_http_table() {
        let classifier = ErrorClassifier::default();
        let key = classifier.classify(Some("404"), None);
        assert_eq!(key.to_string(), "404: Not Found");
        let key = classifier.classify(Some("503"), Some(""));
        assert_eq!(key.message(), "Service Unavailable");
    }

    #[test]
    fn missing_code_and_unknown_message() {
        let classifier = ErrorClassifier::default();
        let key = classifier.classify(None, None);
        assert_eq!(key.code(), DEFAULT_CODE);
        assert_eq!(key.message(), UNSPECIFIED_ERROR);

        let english = ErrorClassifier::new("Unspecified error");
        assert_eq!(
            english.classify(Some("418"), None).to_string(),
            "418: Unspecified error"
        );
    }

    #[test]
    fn sample_message_wins_over_table() {
        let classifier = ErrorClassifier::default();
        let key = classifier.classify(Some("500"), Some("Non HTTP response code"));
        assert_eq!(key.to_string(), "500: Non HTTP response code");
    }

    #[test]
    fn two_not_found() {
        let mut classifier = ErrorClassifier::default();
        for _ in 0..2 {
            let key = classifier.classify(Some("404"), None);
            classifier.record(&key);
        }
        assert_eq!(
            classifier.finalize(),
            vec![ErrorDetail {
                code: "404".to_string(),
                message: "Not Found".to_string(),
                count: 2,
            }]
        );
    }

    #[test]
    fn finalize_is_descending_and_stable() {
        let mut classifier = ErrorClassifier::default();
        let codes = ["500", "404", "401", "404", "503", "401"];
        for code in codes {
            let key = classifier.classify(Some(code), None);
            classifier.record(&key);
        }
        assert_eq!(classifier.total(), 6);
        let order: Vec<(String, u64)> = classifier
            .finalize()
            .into_iter()
            .map(|d| (d.code, d.count))
            .collect();
        assert_eq!(
            order,
            vec![
                ("404".to_string(), 2),
                ("401".to_string(), 2),
                ("500".to_string(), 1),
                ("503".to_string(), 1),
            ]
        );
    }

    #[test]
    fn tally_serializes_as_object() {
        let classifier = ErrorClassifier::default();
        let mut tally = ErrorTally::default();
        let not_found = classifier.classify(Some("404"), None);
        tally.record(&not_found);
        tally.record(&not_found);
        tally.record(&classifier.classify(Some("500"), Some("boom")));
        assert_eq!(tally.count(&not_found), 2);
        let json = serde_json::to_string(&tally).expect("serializable");
        assert_eq!(json, r#"{"404: Not Found":2,"500: boom":1}"#);
    }
}
