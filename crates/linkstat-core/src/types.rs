use crate::report::REPORT_TITLE;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest number of URLs accepted in one link submission
pub const MAX_LINKS_PER_REQUEST: usize = 100;

/// Largest number of sequence numbers accepted in one report request
pub const MAX_NUMBERS_PER_REQUEST: usize = 50;

/// Reachability classification of a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Available,
    Unavailable,
}

impl LinkStatus {
    /// Classify an HTTP status code: 2xx and 3xx count as available
    #[must_use]
    pub const fn from_http_status(code: u16) -> Self {
        if code >= 200 && code < 400 {
            Self::Available
        } else {
            Self::Unavailable
        }
    }

    /// Wire form used in ledgers and JSON output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }

    /// Capitalized form used in rendered reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Unavailable => "Unavailable",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL to status mapping, in the order the URLs were submitted
pub type StatusMap = IndexMap<String, LinkStatus>;

/// A batch of URLs to probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub links: Vec<String>,
}

impl LinkRequest {
    pub fn new<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            links: links.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject empty and oversized batches
    pub fn validate(&self) -> Result<()> {
        if self.links.is_empty() {
            return Err(Error::Validation("no links provided".into()));
        }
        if self.links.len() > MAX_LINKS_PER_REQUEST {
            return Err(Error::Validation(format!(
                "too many links, maximum {MAX_LINKS_PER_REQUEST}"
            )));
        }
        Ok(())
    }

    /// Canonical encoding used for the pending-entry digest: URL bytes concatenated
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.links.iter().map(String::len).sum());
        for link in &self.links {
            bytes.extend_from_slice(link.as_bytes());
        }
        bytes
    }
}

/// A batch of previously assigned sequence numbers to report on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRequest {
    #[serde(rename = "links_list")]
    pub numbers: Vec<u64>,
}

impl NumberRequest {
    pub fn new(numbers: impl IntoIterator<Item = u64>) -> Self {
        Self {
            numbers: numbers.into_iter().collect(),
        }
    }

    /// Reject empty and oversized batches, and zero (numbering starts at 1)
    pub fn validate(&self) -> Result<()> {
        if self.numbers.is_empty() {
            return Err(Error::Validation("no link numbers provided".into()));
        }
        if self.numbers.len() > MAX_NUMBERS_PER_REQUEST {
            return Err(Error::Validation(format!(
                "too many link numbers, maximum {MAX_NUMBERS_PER_REQUEST}"
            )));
        }
        if self.numbers.contains(&0) {
            return Err(Error::Validation(
                "link numbers must be positive integers".into(),
            ));
        }
        Ok(())
    }

    /// Canonical encoding used for the pending-entry digest: 8-byte little-endian per number
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.numbers.iter().flat_map(|n| n.to_le_bytes()).collect()
    }
}

/// A probed batch together with its assigned sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    pub links: StatusMap,
    #[serde(rename = "links_num")]
    pub number: u64,
}

/// A rendered report plus a description that is always populated.
///
/// `lines` are the numbered `"{n}. {url} - {Status}"` entries and `pdf` is the
/// encoded document built from them. Both are empty for a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub description: String,
    #[serde(rename = "entries", default)]
    pub lines: Vec<String>,
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub generated_at: DateTime<Utc>,
}

impl ReportArtifact {
    /// An artifact with no content, carrying only a description
    #[must_use]
    pub fn placeholder(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            lines: Vec::new(),
            pdf: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Plain-text rendition: title, blank line, then one entry per line.
    /// Empty for a placeholder.
    #[must_use]
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut text = format!("{REPORT_TITLE}\n\n");
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// The numbered entries of the report, in order
    #[must_use]
    pub fn entries(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }
}

/// Output of a recovery pass over the pending ledgers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveredWork {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<ReportArtifact>,
}

impl RecoveredWork {
    /// Single descriptive report and no link results
    #[must_use]
    pub fn placeholder(description: impl Into<String>) -> Self {
        Self {
            links: Vec::new(),
            reports: vec![ReportArtifact::placeholder(description)],
        }
    }

    /// True when this carries only a description and no regenerated work
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.links.is_empty() && self.reports.len() == 1 && self.reports[0].is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_http_code() {
        assert_eq!(LinkStatus::from_http_status(200), LinkStatus::Available);
        assert_eq!(LinkStatus::from_http_status(301), LinkStatus::Available);
        assert_eq!(LinkStatus::from_http_status(399), LinkStatus::Available);
        assert_eq!(LinkStatus::from_http_status(199), LinkStatus::Unavailable);
        assert_eq!(LinkStatus::from_http_status(404), LinkStatus::Unavailable);
        assert_eq!(LinkStatus::from_http_status(503), LinkStatus::Unavailable);
    }

    #[test]
    fn test_link_request_bounds() {
        assert!(LinkRequest::new(Vec::<String>::new()).validate().is_err());
        assert!(LinkRequest::new(["a.com"]).validate().is_ok());

        let hundred: Vec<String> = (0..100).map(|i| format!("site{i}.com")).collect();
        assert!(LinkRequest::new(hundred.clone()).validate().is_ok());

        let mut too_many = hundred;
        too_many.push("one-more.com".into());
        let err = LinkRequest::new(too_many).validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_number_request_bounds() {
        assert!(NumberRequest::new([]).validate().is_err());
        assert!(NumberRequest::new([0]).validate().is_err());
        assert!(NumberRequest::new(1..=50).validate().is_ok());
        assert!(NumberRequest::new(1..=51).validate().is_err());
    }

    #[test]
    fn test_canonical_bytes() {
        let links = LinkRequest::new(["a.com", "b.com"]);
        assert_eq!(links.canonical_bytes(), b"a.comb.com".to_vec());

        let numbers = NumberRequest::new([1, 258]);
        assert_eq!(
            numbers.canonical_bytes(),
            vec![1, 0, 0, 0, 0, 0, 0, 0, 2, 1, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_link_result_wire_format() {
        let mut links = StatusMap::new();
        links.insert("b.com".into(), LinkStatus::Unavailable);
        links.insert("a.com".into(), LinkStatus::Available);
        let result = LinkResult { links, number: 7 };

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"links":{"b.com":"unavailable","a.com":"available"},"links_num":7}"#
        );
    }

    #[test]
    fn test_number_request_wire_name() {
        let parsed: NumberRequest = serde_json::from_str(r#"{"links_list":[3,1]}"#).unwrap();
        assert_eq!(parsed.numbers, vec![3, 1]);
    }

    #[test]
    fn test_recovered_work_placeholder() {
        let work = RecoveredWork::placeholder("no unfinished work found");
        assert!(work.is_placeholder());
        assert_eq!(work.reports[0].description, "no unfinished work found");
        assert!(!RecoveredWork::default().is_placeholder());
    }
}
