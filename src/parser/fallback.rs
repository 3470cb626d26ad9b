//! Title, description, and fallback-variant extraction.

use scraper::{Html, Selector};
use std::sync::LazyLock;

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".rich_media_title, #activity-name, h1")
        .expect("BUG: hardcoded title selector is invalid")
});
static DESCRIPTION_TEXT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#js_image_desc, .share_notice").expect("BUG: hardcoded description selector is invalid")
});
static DESCRIPTION_META_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("BUG: hardcoded meta description selector is invalid")
});
static TOPIC_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".wx_topic_link").expect("BUG: hardcoded topic link selector is invalid"));

static FALLBACK_TEXT_SELECTORS: &[&str] = &[
    ".rich_media_content",
    "#js_content",
    ".rich_media_area_primary",
    "article",
    ".article-content",
];
static FALLBACK_IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"img[data-src], img[src*="mmbiz.qpic.cn"]"#)
        .expect("BUG: hardcoded fallback image selector is invalid")
});

pub fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn extract_description(document: &Html) -> Option<String> {
    if let Some(el) = document.select(&DESCRIPTION_TEXT_SELECTOR).next() {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    document
        .select(&DESCRIPTION_META_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn extract_topic_tags(document: &Html) -> Vec<String> {
    document
        .select(&TOPIC_LINK_SELECTOR)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Fallback variant: plain text from the first matching
/// content selector, plus up to 20 images from a narrower selector,
/// excluding data-URIs.
pub fn extract_fallback_body(document: &Html) -> String {
    let mut parts = Vec::new();

    if let Some(title) = extract_title(document) {
        parts.push(format!("# {title}"));
    }

    for raw in FALLBACK_TEXT_SELECTORS {
        let selector = Selector::parse(raw).expect("BUG: hardcoded fallback text selector failed to parse");
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<Vec<_>>().join("\n");
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
                break;
            }
        }
    }

    let images: Vec<String> = document
        .select(&FALLBACK_IMG_SELECTOR)
        .filter_map(|img| {
            let src = img
                .value()
                .attr("data-src")
                .or_else(|| img.value().attr("src"))?;
            if src.starts_with("data:image") {
                return None;
            }
            let alt = img.value().attr("alt").unwrap_or("");
            Some(format!("![{alt}]({src})"))
        })
        .take(20)
        .collect();
    parts.extend(images);

    parts.join("\n\n").trim().to_string()
}
