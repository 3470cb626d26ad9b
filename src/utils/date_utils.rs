//! Local-timezone date helpers.
//!
//! Window filtering is date-granularity, both edges inclusive.

use chrono::{Local, NaiveDate, TimeZone};

/// Format a Unix timestamp as `YYYY-MM-DD HH:MM:SS` in local time, for
/// `PostRecord::published_at_text`.
#[must_use]
pub fn format_local(unix_seconds: i64) -> String {
    match Local.timestamp_opt(unix_seconds, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => String::new(),
    }
}

fn local_date(unix_seconds: i64) -> Option<NaiveDate> {
    match Local.timestamp_opt(unix_seconds, 0) {
        chrono::LocalResult::Single(dt) => Some(dt.date_naive()),
        _ => None,
    }
}

/// Is `unix_seconds`'s local-calendar date within `[window_start,
/// window_end]`, both edges inclusive?
#[must_use]
pub fn same_or_between_dates(unix_seconds: i64, window_start: NaiveDate, window_end: NaiveDate) -> bool {
    match local_date(unix_seconds) {
        Some(date) => window_start <= date && date <= window_end,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_timestamp() {
        let text = format_local(0);
        assert_eq!(text.len(), "YYYY-MM-DD HH:MM:SS".len());
    }

    #[test]
    fn window_is_inclusive_on_both_edges() {
        let date = local_date(1_700_000_000).unwrap();
        assert!(same_or_between_dates(1_700_000_000, date, date));
        assert!(!same_or_between_dates(1_700_000_000, date.succ_opt().unwrap(), date.succ_opt().unwrap()));
    }

    #[test]
    fn outside_window_is_excluded() {
        let date = local_date(1_700_000_000).unwrap();
        let day_before = date.pred_opt().unwrap();
        assert!(!same_or_between_dates(1_700_000_000, day_before, day_before));
    }
}
