//! Post Parser (C2): HTML document -> canonical Markdown post body.
//!
//! Never raises: every extraction path degrades to the next, and an empty
//! string is itself a valid, meaningful result meaning "body unavailable" —
//! the caller keeps the record.

mod fallback;
mod images;
mod markdown;
mod variant;

use scraper::{Html, Selector};

pub use variant::Variant;

const MIN_CONTENT_LENGTH: usize = 10;

/// Extract a post's Markdown body from its raw HTML. Variant-aware, falling
/// through gallery -> article -> fallback, each with its own internal
/// fallback, and never returns an error.
#[must_use]
pub fn extract_body(html: &str) -> String {
    let document = Html::parse_document(html);

    match variant::detect(&document) {
        Variant::Gallery => {
            let body = extract_gallery_body(&document);
            if body.trim().chars().count() >= MIN_CONTENT_LENGTH {
                return body;
            }
            extract_article_or_fallback(&document)
        }
        Variant::Article => extract_article_or_fallback(&document),
        Variant::Fallback => fallback::extract_fallback_body(&document),
    }
}

fn extract_article_or_fallback(document: &Html) -> String {
    if let Some(raw_selector) = variant::first_article_selector_match(document) {
        let selector = Selector::parse(raw_selector).expect("BUG: article selector failed to re-parse");
        if let Some(root) = document.select(&selector).next() {
            let body = markdown::subtree_to_markdown(root);
            if body.chars().count() >= MIN_CONTENT_LENGTH {
                return body;
            }
        }
    }
    fallback::extract_fallback_body(document)
}

/// Gallery variant composition: title, optional description, `## 图片内容`
/// header, one image block per image, then topic tags.
fn extract_gallery_body(document: &Html) -> String {
    let mut parts = Vec::new();

    if let Some(title) = fallback::extract_title(document) {
        parts.push(format!("# {title}"));
    }
    if let Some(description) = fallback::extract_description(document) {
        parts.push(description);
    }

    let gallery_images = images::extract_gallery_images(document);
    if !gallery_images.is_empty() {
        parts.push("## 图片内容".to_string());
        for (alt, src) in &gallery_images {
            parts.push(format!("![{alt}]({src})"));
        }
    }

    let topics = fallback::extract_topic_tags(document);
    if !topics.is_empty() {
        parts.push(format!("**话题标签**: {}", topics.join(" ")));
    }

    parts.join("\n\n").trim().to_string()
}
