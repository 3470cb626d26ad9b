//! Batch configuration and validation.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one publisher is required")]
    NoPublishers,
    #[error("window_start ({0}) must be on or before window_end ({1})")]
    InvertedWindow(NaiveDate, NaiveDate),
    #[error("max_pages_per_publisher must be in 1..=100, got {0}")]
    MaxPagesOutOfRange(u32),
    #[error("request_interval_seconds must be in 1..=60, got {0}")]
    RequestIntervalOutOfRange(u32),
    #[error("max_concurrent_publishers must be >= 1, got {0}")]
    MaxConcurrentPublishersOutOfRange(u32),
    #[error("max_concurrent_requests_per_publisher must be >= 1, got {0}")]
    MaxConcurrentRequestsOutOfRange(u32),
}

/// Production PubPlat host; overridable via [`BatchConfigBuilder::base_url`]
/// for staging environments and for pointing the pipeline at a mock server
/// in tests.
pub const DEFAULT_BASE_URL: &str = "https://mp.weixin.qq.com";

/// Validated batch configuration. Construct only via [`BatchConfigBuilder`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub base_url: String,
    pub publishers: Vec<String>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub max_pages_per_publisher: u32,
    pub request_interval_seconds: u32,
    pub fetch_bodies: bool,
    pub body_keyword: String,
    pub max_concurrent_publishers: u32,
    pub max_concurrent_requests_per_publisher: u32,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchConfigBuilder {
    base_url: String,
    publishers: Vec<String>,
    window_start: Option<NaiveDate>,
    window_end: Option<NaiveDate>,
    max_pages_per_publisher: u32,
    request_interval_seconds: u32,
    fetch_bodies: bool,
    body_keyword: String,
    max_concurrent_publishers: u32,
    max_concurrent_requests_per_publisher: u32,
    output_path: Option<String>,
}

impl Default for BatchConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            publishers: Vec::new(),
            window_start: None,
            window_end: None,
            max_pages_per_publisher: 10,
            request_interval_seconds: 5,
            fetch_bodies: false,
            body_keyword: String::new(),
            max_concurrent_publishers: 3,
            max_concurrent_requests_per_publisher: 3,
            output_path: None,
        }
    }
}

impl BatchConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn publishers(mut self, publishers: Vec<String>) -> Self {
        self.publishers = publishers;
        self
    }

    #[must_use]
    pub fn window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    #[must_use]
    pub fn max_pages_per_publisher(mut self, n: u32) -> Self {
        self.max_pages_per_publisher = n;
        self
    }

    #[must_use]
    pub fn request_interval_seconds(mut self, n: u32) -> Self {
        self.request_interval_seconds = n;
        self
    }

    #[must_use]
    pub fn fetch_bodies(mut self, yes: bool) -> Self {
        self.fetch_bodies = yes;
        self
    }

    #[must_use]
    pub fn body_keyword(mut self, keyword: String) -> Self {
        self.body_keyword = keyword;
        self
    }

    #[must_use]
    pub fn max_concurrent_publishers(mut self, n: u32) -> Self {
        self.max_concurrent_publishers = n;
        self
    }

    #[must_use]
    pub fn max_concurrent_requests_per_publisher(mut self, n: u32) -> Self {
        self.max_concurrent_requests_per_publisher = n;
        self
    }

    #[must_use]
    pub fn output_path(mut self, path: Option<String>) -> Self {
        self.output_path = path;
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        if self.publishers.is_empty() {
            return Err(ConfigError::NoPublishers);
        }
        let window_start = self.window_start.unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        let window_end = self.window_end.unwrap_or(window_start);
        if window_start > window_end {
            return Err(ConfigError::InvertedWindow(window_start, window_end));
        }
        if !(1..=100).contains(&self.max_pages_per_publisher) {
            return Err(ConfigError::MaxPagesOutOfRange(self.max_pages_per_publisher));
        }
        if !(1..=60).contains(&self.request_interval_seconds) {
            return Err(ConfigError::RequestIntervalOutOfRange(self.request_interval_seconds));
        }
        if self.max_concurrent_publishers < 1 {
            return Err(ConfigError::MaxConcurrentPublishersOutOfRange(self.max_concurrent_publishers));
        }
        if self.max_concurrent_requests_per_publisher < 1 {
            return Err(ConfigError::MaxConcurrentRequestsOutOfRange(
                self.max_concurrent_requests_per_publisher,
            ));
        }

        Ok(BatchConfig {
            base_url: self.base_url,
            publishers: self.publishers,
            window_start,
            window_end,
            max_pages_per_publisher: self.max_pages_per_publisher,
            request_interval_seconds: self.request_interval_seconds,
            fetch_bodies: self.fetch_bodies,
            body_keyword: self.body_keyword,
            max_concurrent_publishers: self.max_concurrent_publishers,
            max_concurrent_requests_per_publisher: self.max_concurrent_requests_per_publisher,
            output_path: self.output_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_empty_publisher_list() {
        let err = BatchConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::NoPublishers);
    }

    #[test]
    fn rejects_inverted_window() {
        let err = BatchConfigBuilder::new()
            .publishers(vec!["p".into()])
            .window(date(2024, 2, 1), date(2024, 1, 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedWindow(_, _)));
    }

    #[test]
    fn rejects_out_of_range_pages() {
        let err = BatchConfigBuilder::new()
            .publishers(vec!["p".into()])
            .window(date(2024, 1, 1), date(2024, 1, 2))
            .max_pages_per_publisher(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MaxPagesOutOfRange(0));
    }

    #[test]
    fn accepts_reasonable_config() {
        let config = BatchConfigBuilder::new()
            .publishers(vec!["p".into()])
            .window(date(2024, 1, 1), date(2024, 1, 31))
            .max_pages_per_publisher(10)
            .request_interval_seconds(5)
            .build()
            .unwrap();
        assert_eq!(config.publishers.len(), 1);
    }
}
