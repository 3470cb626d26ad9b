//! Integration coverage for content search over a loaded result set and the
//! sink's file round-trip, exercised together the way a `scrape` ->
//! `search` CLI pipeline would use them.

use pubplat_scraper::{search, sink, PostRecord};

fn records() -> Vec<PostRecord> {
    vec![
        PostRecord {
            publisher: "Demo".into(),
            title: "网盘资源".into(),
            url: "https://example.com/post/1".into(),
            published_at: 1_704_153_600,
            published_at_text: "2024-01-02 00:00:00".into(),
            body: "分享链接：https://pan.quark.cn/s/abc123） 请查收".into(),
        },
        PostRecord {
            publisher: "Demo".into(),
            title: "无关内容".into(),
            url: "https://example.com/post/2".into(),
            published_at: 1_704_240_000,
            published_at_text: "2024-01-03 00:00:00".into(),
            body: "这里没有任何网盘链接".into(),
        },
    ]
}

#[test]
fn url_wildcard_search_finds_only_the_matching_record_and_round_trips_through_csv() {
    let records = records();
    let hits = search::search(&records, "https://pan.quark.cn/s/*").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].matches, vec!["https://pan.quark.cn/s/abc123"]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    sink::write_atomic(&records, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with('\u{feff}'));
    assert!(written.contains("公众号,标题,发布时间,链接,内容"));
    assert!(written.contains("网盘资源"));
}

#[test]
fn json_output_preserves_both_records_in_order() {
    let records = records();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    sink::write_atomic(&records, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    let array = parsed.as_array().unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["标题"], "网盘资源");
    assert_eq!(array[1]["标题"], "无关内容");
}
