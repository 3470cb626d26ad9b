//! Gallery image extraction, URL canonicalization, and dedup.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("BUG: hardcoded 'script' selector is invalid"));
static SWIPER_ITEM_IMG_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".swiper_item_img img").expect("BUG: hardcoded swiper_item_img selector is invalid")
});
static SWIPER_ITEM_DATA_SRC_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".swiper_item[data-src]").expect("BUG: hardcoded swiper_item[data-src] selector is invalid")
});
static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("BUG: hardcoded 'img' selector is invalid"));

/// Top-level-only `cdn_url` pairs inside `picture_page_info_list`. Intentionally
/// does not recurse into nested object literals: a greedier regex would also
/// match `watermark_info.cdn_url` / `share_cover.cdn_url`, leaking watermarked
/// or cover-only URLs into the image list.
static TOP_LEVEL_CDN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"height:\s*'\d+'\s*\*\s*1,\s*cdn_url:\s*'([^']*)'")
        .expect("BUG: hardcoded top-level cdn_url regex is invalid")
});

static CLASS_FILTER_TERMS: &[&str] =
    &["wx_follow_avatar_pic", "jump_author_avatar", "avatar", "profile_avatar", "icon"];

/// `/300?`, `/1080?`, etc. Originals end `/0?`.
static THUMBNAIL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[1-9]\d*\?").expect("BUG: hardcoded thumbnail-path regex is invalid"));

/// The `src` an `<img>` should be read as once lazy-loading placeholders are
/// accounted for. Normalization happens at read time rather than by mutating
/// the parsed tree, since `scraper`'s DOM is read-only.
pub fn effective_src(img: &ElementRef) -> Option<String> {
    let src = img.value().attr("src").unwrap_or("");
    let data_src = img.value().attr("data-src").unwrap_or("");

    let is_placeholder = src.is_empty() || src.starts_with("data:image/svg") || src.contains("pic_blank");
    if is_placeholder && !data_src.is_empty() {
        Some(data_src.to_string())
    } else if !src.is_empty() {
        Some(src.to_string())
    } else if !data_src.is_empty() {
        Some(data_src.to_string())
    } else {
        None
    }
}

/// Canonicalize a URL for dedup: unescape HTML entities, force `https://`,
/// strip query string, strip a trailing slash.
/// Unescape HTML entities and force `https://`, but keep the query string —
/// the thumbnail check below needs it intact.
fn normalize_https(url: &str) -> String {
    let unescaped = html_escape::decode_html_entities(url);
    if let Some(rest) = unescaped.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        unescaped.into_owned()
    }
}

pub fn canonicalize(url: &str) -> String {
    let https = normalize_https(url);
    let without_query = https.split('?').next().unwrap_or(&https);
    without_query.trim_end_matches('/').to_string()
}

/// Gallery-variant thumbnail detector: URLs whose path segment after the
/// last `/` matches `/[1-9]\d*\?` are resized thumbnails; originals end
/// `/0?`. Does not apply to the article variant, where `/640?` is content.
/// Must run against the query-bearing form, since the marker is the `?`
/// that [`canonicalize`]'s dedup key strips away.
pub fn is_thumbnail(url: &str) -> bool {
    THUMBNAIL_PATH.is_match(&normalize_https(url))
}

/// Gallery image extraction, stopping at the first method yielding ≥ 1
/// image, in order of precedence. Returns a canonicalized, deduplicated,
/// thumbnail-filtered, original-URL-preserving image list as `(alt, src)`.
pub fn extract_gallery_images(document: &Html) -> Vec<(String, String)> {
    let mut out = extract_from_js_variable(document);
    if out.is_empty() {
        out = extract_from_swiper_item_img(document);
    }
    if out.is_empty() {
        out = extract_from_swiper_item_data_src(document);
    }
    if out.is_empty() {
        out = extract_from_filtered_content_images(document);
    }
    if out.is_empty() {
        out = extract_from_global_sweep(document);
    }
    dedup_and_filter_thumbnails(out)
}

fn extract_from_js_variable(document: &Html) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for script in document.select(&SCRIPT_SELECTOR) {
        let text = script.text().collect::<String>();
        if !text.contains("picture_page_info_list") {
            continue;
        }
        for cap in TOP_LEVEL_CDN_URL.captures_iter(&text) {
            if let Some(url) = cap.get(1) {
                let decoded = unescape_js_string(url.as_str());
                if !decoded.is_empty() {
                    out.push((String::new(), decoded));
                }
            }
        }
        if !out.is_empty() {
            break;
        }
    }
    out
}

/// `picture_page_info_list` entries are JS object-literal syntax, not JSON:
/// unquoted keys, single-quoted strings, `\xNN` hex escapes. The regex path
/// above handles the common case; this unescape step only resolves HTML
/// entities and hex escapes already captured within one `cdn_url` value.
fn unescape_js_string(raw: &str) -> String {
    let entity_decoded = html_escape::decode_html_entities(raw).into_owned();
    let mut out = String::with_capacity(entity_decoded.len());
    let mut chars = entity_decoded.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'x') {
            chars.next();
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                out.push(byte as char);
                continue;
            }
            out.push('\\');
            out.push('x');
            out.push_str(&hex);
            continue;
        }
        out.push(c);
    }
    out
}

fn extract_from_swiper_item_img(document: &Html) -> Vec<(String, String)> {
    document
        .select(&SWIPER_ITEM_IMG_SELECTOR)
        .filter_map(|img| effective_src(&img).map(|src| (img.value().attr("alt").unwrap_or("").to_string(), src)))
        .collect()
}

fn extract_from_swiper_item_data_src(document: &Html) -> Vec<(String, String)> {
    document
        .select(&SWIPER_ITEM_DATA_SRC_SELECTOR)
        .filter_map(|el| el.value().attr("data-src").map(|src| (String::new(), src.to_string())))
        .collect()
}

fn extract_from_filtered_content_images(document: &Html) -> Vec<(String, String)> {
    document
        .select(&IMG_SELECTOR)
        .filter(|img| !is_avatar_like(img))
        .filter(|img| passes_min_width(img))
        .filter_map(|img| effective_src(&img).map(|src| (img.value().attr("alt").unwrap_or("").to_string(), src)))
        .collect()
}

fn extract_from_global_sweep(document: &Html) -> Vec<(String, String)> {
    document
        .select(&IMG_SELECTOR)
        .filter_map(|img| effective_src(&img).map(|src| (img.value().attr("alt").unwrap_or("").to_string(), src)))
        .collect()
}

fn is_avatar_like(img: &ElementRef) -> bool {
    img.value()
        .classes()
        .any(|class| CLASS_FILTER_TERMS.iter().any(|term| class.contains(term)))
}

fn passes_min_width(img: &ElementRef) -> bool {
    match img.value().attr("data-w").and_then(|w| w.parse::<i64>().ok()) {
        Some(w) => w >= 200,
        None => true,
    }
}

fn dedup_and_filter_thumbnails(images: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (alt, src) in images {
        if is_thumbnail(&src) {
            continue;
        }
        let canonical = canonicalize(&src);
        if seen.insert(canonical) {
            out.push((alt, src));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_rewrites_http_strips_query_and_trailing_slash() {
        assert_eq!(
            canonicalize("http://mmbiz.qpic.cn/img/abc/0?wx_fmt=jpeg"),
            "https://mmbiz.qpic.cn/img/abc/0"
        );
        assert_eq!(canonicalize("https://x.example/a/"), "https://x.example/a");
    }

    #[test]
    fn thumbnail_paths_are_detected() {
        assert!(is_thumbnail("https://mmbiz.qpic.cn/img/abc/300?wx_fmt=jpeg"));
        assert!(!is_thumbnail("https://mmbiz.qpic.cn/img/abc/0?wx_fmt=jpeg"));
    }

    #[test]
    fn js_variable_scan_ignores_nested_cdn_url() {
        let html = r#"<html><body class="page_share_img"><script>var picture_page_info_list = [{width:'1280'*1,height:'1809'*1,cdn_url:'https://mmbiz.qpic.cn/mmbiz_jpg/AAA/0?wx_fmt=jpeg',watermark_info:{cdn_url:'http://mmbiz.qpic.cn/mmbiz_jpg/XXX/300?'}},{height:'800'*1,cdn_url:'https://mmbiz.qpic.cn/mmbiz_jpg/BBB/0?wx_fmt=jpeg'}];</script></body></html>"#;
        let document = Html::parse_document(html);
        let images = extract_gallery_images(&document);
        let srcs: Vec<&str> = images.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(
            srcs,
            vec![
                "https://mmbiz.qpic.cn/mmbiz_jpg/AAA/0?wx_fmt=jpeg",
                "https://mmbiz.qpic.cn/mmbiz_jpg/BBB/0?wx_fmt=jpeg",
            ]
        );
    }
}
