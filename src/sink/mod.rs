//! Result Sink (C7): canonical record -> CSV/JSON, atomic write.

mod record;

pub use record::PostRecord;

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Column order is the wire contract: `公众号, 标题, 发布时间, 链接, 内容`.
const CSV_HEADER: &str = "公众号,标题,发布时间,链接,内容";

/// Render records as UTF-8 CSV with a leading BOM, `\n` line endings, and
/// RFC 4180 quoting wherever a field holds a comma, quote, or newline.
#[must_use]
pub fn render_csv(records: &[PostRecord]) -> String {
    let mut out = String::from('\u{feff}');
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        let fields = [
            &record.publisher,
            &record.title,
            &record.published_at_text,
            &record.url,
            &record.body,
        ];
        let line = fields.iter().map(|f| csv_quote(f)).collect::<Vec<_>>().join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn csv_quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render records as a JSON array of objects, keys in the same order as the
/// CSV header, 2-space indent, no BOM.
pub fn render_json(records: &[PostRecord]) -> Result<String, SinkError> {
    let values: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "公众号": r.publisher,
                "标题": r.title,
                "发布时间": r.published_at_text,
                "链接": r.url,
                "内容": r.body,
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&values)?)
}

/// Output format selected by the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Write `records` to `path` in the format implied by its extension,
/// replacing any existing file atomically via a same-directory temp file.
pub fn write_atomic(records: &[PostRecord], path: &Path) -> Result<(), SinkError> {
    let content = match OutputFormat::from_path(path) {
        OutputFormat::Csv => render_csv(records),
        OutputFormat::Json => render_json(records)?,
    };

    let parent_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PostRecord {
        PostRecord {
            publisher: "示例公众号".into(),
            title: "标题, 带逗号".into(),
            url: "https://example.com/a".into(),
            published_at: 1_700_000_000,
            published_at_text: "2023-11-14 22:13:20".into(),
            body: "内容带\"引号\"".into(),
        }
    }

    #[test]
    fn csv_has_bom_and_header() {
        let csv = render_csv(&[]);
        assert!(csv.starts_with('\u{feff}'));
        assert!(csv.contains(CSV_HEADER));
    }

    #[test]
    fn csv_quotes_fields_with_special_characters() {
        let csv = render_csv(&[sample()]);
        assert!(csv.contains("\"标题, 带逗号\""));
        assert!(csv.contains("\"内容带\"\"引号\"\"\""));
    }

    #[test]
    fn json_uses_canonical_keys_in_order() {
        let json = render_json(&[sample()]).unwrap();
        assert!(json.find("公众号").unwrap() < json.find("标题").unwrap());
        assert!(json.find("标题").unwrap() < json.find("发布时间").unwrap());
        assert!(json.find("发布时间").unwrap() < json.find("链接").unwrap());
        assert!(json.find("链接").unwrap() < json.find("内容").unwrap());
        assert!(!json.starts_with('\u{feff}'));
    }

    #[test]
    fn write_atomic_round_trips_csv() {
        use assert_fs::prelude::*;

        let dir = assert_fs::TempDir::new().unwrap();
        let child = dir.child("out.csv");
        write_atomic(&[sample()], child.path()).unwrap();
        let content = std::fs::read_to_string(child.path()).unwrap();
        assert!(content.starts_with('\u{feff}'));
    }

    #[test]
    fn write_atomic_round_trips_json() {
        use assert_fs::prelude::*;

        let dir = assert_fs::TempDir::new().unwrap();
        let child = dir.child("out.json");
        write_atomic(&[sample()], child.path()).unwrap();
        let content = std::fs::read_to_string(child.path()).unwrap();
        assert!(!content.starts_with('\u{feff}'));
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn output_format_detected_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Csv);
    }
}
