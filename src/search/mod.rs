//! Content Search (C9): wildcard pattern -> record matches over a loaded result set.

use crate::sink::PostRecord;
use regex::{Regex, RegexBuilder};

/// Characters trimmed, repeatedly, from the right end of a raw URL match.
const TRAILING_GARBAGE: &[char] =
    &['*', ')', ']', '>', '"', '\'', '，', '。', '！', '？', '、', '；', '：', '“', '”', '‘', '’', '）', '】', '》', '\n', '\r', '\t', ' '];

const URL_CHAR_CLASS: &str = r"[A-Za-z0-9_\-.~:/?#\[\]@!$&'()+,;=%]";

/// One record's distinct matches, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub publisher: String,
    pub title: String,
    pub url: String,
    pub matches: Vec<String>,
}

/// Compile a wildcard pattern (`*`, `?`, `\`-escape, literal everything
/// else) into a case-insensitive regex. URL mode (pattern starts with
/// `http://`/`https://`) restricts `*`/`?` to URL-safe characters.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let is_url_pattern = pattern.starts_with("http://") || pattern.starts_with("https://");
    let mut regex_pattern = String::new();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' if is_url_pattern => regex_pattern.push_str(&format!("{URL_CHAR_CLASS}*")),
            '*' => regex_pattern.push_str(".*"),
            '?' if is_url_pattern => regex_pattern.push_str(URL_CHAR_CLASS),
            '?' => regex_pattern.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    regex_pattern.push_str(&regex::escape(&next.to_string()));
                }
            }
            c if "[](){}|^$+.".contains(c) => {
                regex_pattern.push('\\');
                regex_pattern.push(c);
            }
            c => regex_pattern.push(c),
        }
    }

    RegexBuilder::new(&regex_pattern).case_insensitive(true).build()
}

/// Strip trailing garbage characters from a raw URL match, repeatedly,
/// until none remain at the right end.
fn clean_url(raw: &str) -> &str {
    let mut end = raw.len();
    loop {
        let Some(c) = raw[..end].chars().next_back() else { break };
        if TRAILING_GARBAGE.contains(&c) {
            end -= c.len_utf8();
        } else {
            break;
        }
    }
    &raw[..end]
}

/// Search every record's body for `pattern`, returning one [`SearchHit`]
/// per record with at least one distinct match, preserving first-seen
/// order within each record.
pub fn search(records: &[PostRecord], pattern: &str) -> Result<Vec<SearchHit>, regex::Error> {
    let is_url_pattern = pattern.starts_with("http://") || pattern.starts_with("https://");
    let regex = compile_pattern(pattern)?;

    let mut hits = Vec::new();
    for record in records {
        let mut matches: Vec<String> = Vec::new();
        for m in regex.find_iter(&record.body) {
            let text = if is_url_pattern { clean_url(m.as_str()) } else { m.as_str() };
            if !text.is_empty() && !matches.iter().any(|existing| existing == text) {
                matches.push(text.to_string());
            }
        }
        if !matches.is_empty() {
            hits.push(SearchHit {
                publisher: record.publisher.clone(),
                title: record.title.clone(),
                url: record.url.clone(),
                matches,
            });
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &str) -> PostRecord {
        PostRecord {
            publisher: "p".into(),
            title: "t".into(),
            url: "https://example.com/post".into(),
            published_at: 1,
            published_at_text: String::new(),
            body: body.into(),
        }
    }

    #[test]
    fn generic_wildcard_matches_case_insensitively() {
        let hits = search(&[record("Hello World, hello again")], "hello*").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matches, vec!["Hello World, hello again"]);
    }

    #[test]
    fn url_mode_trims_trailing_garbage_and_dedupes() {
        let body = "链接：https://pan.quark.cn/s/abc123） 另一个 https://pan.quark.cn/s/abc123，当然";
        let hits = search(&[record(body)], "https://pan.quark.cn/s/*").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matches, vec!["https://pan.quark.cn/s/abc123"]);
    }

    #[test]
    fn zero_matches_excludes_record() {
        let hits = search(&[record("nothing relevant here")], "xyz*").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn question_mark_matches_exactly_one_character() {
        let hits = search(&[record("cat bat hat scatter")], "?at").unwrap();
        assert_eq!(hits[0].matches, vec!["cat", "bat", "hat"]);
    }

    #[test]
    fn backslash_escapes_next_metacharacter() {
        let hits = search(&[record("price: $5.00")], r"\$5\.00").unwrap();
        assert_eq!(hits[0].matches, vec!["$5.00"]);
    }
}
