//! `PostRecord`: the canonical five-field scrape output unit.

use serde::{Deserialize, Serialize};
use url::Url;

/// A single scraped post, materialized progressively by a pipeline and
/// appended to the run's result set. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub publisher: String,
    pub title: String,
    pub url: String,
    pub published_at: i64,
    pub published_at_text: String,
    pub body: String,
}

impl PostRecord {
    /// Structural invariants: `published_at > 0`, `url` parses as an
    /// `https` URL, `title` non-empty.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.published_at > 0
            && !self.title.is_empty()
            && Url::parse(&self.url).is_ok_and(|u| u.scheme() == "https")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PostRecord {
        PostRecord {
            publisher: "p".into(),
            title: "t".into(),
            url: "https://example.com/a".into(),
            published_at: 1,
            published_at_text: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn well_formed_record_passes() {
        assert!(base().is_well_formed());
    }

    #[test]
    fn non_https_scheme_is_rejected() {
        let mut record = base();
        record.url = "http://example.com/a".into();
        assert!(!record.is_well_formed());
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let mut record = base();
        record.url = "not a url".into();
        assert!(!record.is_well_formed());
    }

    #[test]
    fn zero_timestamp_is_rejected() {
        let mut record = base();
        record.published_at = 0;
        assert!(!record.is_well_formed());
    }
}
