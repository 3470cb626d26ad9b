//! Post variant detection.

use scraper::{Html, Selector};
use std::sync::LazyLock;

static SWIPER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".swiper_item, .swiper_item_img, .share_media_swiper")
        .expect("BUG: hardcoded CSS selector for swiper gallery markers is invalid")
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("BUG: hardcoded CSS selector 'body' is invalid"));

/// First-match-wins selector list for the article variant.
pub const ARTICLE_SELECTORS: &[&str] = &[
    ".rich_media_content",
    "#js_content",
    "#js_image_content",
    ".image_content",
    "#js_image_desc",
    ".share_notice",
    ".swiper_item_img",
    "#img_swiper_content",
    ".share_media_swiper_content",
    ".img_swiper_area",
    "#js_video_content",
    ".video_content",
    ".rich_media_video",
    ".rich_media_area_primary",
    ".rich_media_area_primary_inner",
    "#js_article_content",
    "#js_content_container",
    "#page-content",
    ".rich_media_inner",
    ".rich_media_wrp",
    "article",
    ".article",
    "#article",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Gallery,
    Article,
    Fallback,
}

/// Is this document a gallery post: `<body class="page_share_img">` or any
/// of the swiper-gallery marker selectors present anywhere in the DOM.
pub fn is_gallery(document: &Html) -> bool {
    let has_share_img_class = document
        .select(&BODY_SELECTOR)
        .next()
        .map(|body| body.value().classes().any(|c| c == "page_share_img"))
        .unwrap_or(false);

    has_share_img_class || document.select(&SWIPER_SELECTOR).next().is_some()
}

static ARTICLE_COMPILED: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    ARTICLE_SELECTORS
        .iter()
        .map(|raw| {
            (
                *raw,
                Selector::parse(raw).expect("BUG: hardcoded article selector failed to parse"),
            )
        })
        .collect()
});

/// First selector from [`ARTICLE_SELECTORS`] with a match, if any.
pub fn first_article_selector_match(document: &Html) -> Option<&'static str> {
    ARTICLE_COMPILED
        .iter()
        .find(|(_, selector)| document.select(selector).next().is_some())
        .map(|(raw, _)| *raw)
}

pub fn detect(document: &Html) -> Variant {
    if is_gallery(document) {
        return Variant::Gallery;
    }
    if first_article_selector_match(document).is_some() {
        return Variant::Article;
    }
    Variant::Fallback
}
