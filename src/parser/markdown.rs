//! Subtree-to-Markdown conversion for the article variant.
//!
//! `scraper`'s parsed tree is read-only, so this walks `ego_tree` nodes
//! directly rather than going through a general-purpose converter crate —
//! the conversion this parser needs (plain text plus one customized image
//! rule) is narrow enough that a small dedicated walker, in the spirit of
//! a simple node-by-node DOM walker, is the better fit than pulling in a
//! whole handler framework for one rule.

use super::images::effective_src;
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "pre", "table", "tr",
];

/// Tags markdownify's converter treats as inline context; an image whose
/// ancestor chain includes one of these is a candidate for suppression.
const INLINE_TAGS: &[&str] = &[
    "a", "b", "i", "em", "strong", "span", "small", "mark", "s", "u", "sub", "sup", "code", "q", "cite", "abbr",
    "time", "var", "kbd", "samp",
];

/// Parent tags that keep an inline image rendered even inside inline
/// context (`keep_inline_images_in=["section", "span"]` upstream).
const KEEP_INLINE_IMAGES_IN: &[&str] = &["section", "span"];

/// Render an element subtree to Markdown. An image nested under an inline
/// tag (`a`, `span`, `em`, ...) is suppressed to its alt text unless its
/// immediate parent is `section` or `span`; everywhere else images render
/// in block form (`\n![alt](src)\n`).
pub fn subtree_to_markdown(root: ElementRef) -> String {
    let mut buffer = String::new();
    walk(*root, &mut buffer, false);
    buffer.trim().to_string()
}

fn walk(node: NodeRef<'_, Node>, buffer: &mut String, inline_ancestor: bool) {
    match node.value() {
        Node::Text(text) => {
            let compressed = collapse_whitespace(text);
            if !compressed.is_empty() {
                if buffer.ends_with(char::is_alphanumeric) && compressed.starts_with(char::is_alphanumeric) {
                    buffer.push(' ');
                }
                buffer.push_str(&compressed);
            }
        }
        Node::Element(element) => {
            if element.name() == "img" {
                if let Some(element_ref) = ElementRef::wrap(node) {
                    let parent_name = node.parent().and_then(|p| match p.value() {
                        Node::Element(e) => Some(e.name()),
                        _ => None,
                    });
                    let keep = parent_name.is_some_and(|name| KEEP_INLINE_IMAGES_IN.contains(&name));
                    if inline_ancestor && !keep {
                        suppress_image(&element_ref, buffer);
                    } else {
                        render_image(&element_ref, buffer);
                    }
                }
                return;
            }
            if element.name() == "script" || element.name() == "style" {
                return;
            }

            let is_block = BLOCK_TAGS.contains(&element.name());
            if is_block {
                ensure_blank_line(buffer);
            }
            let child_inline_ancestor = inline_ancestor || INLINE_TAGS.contains(&element.name());
            for child in node.children() {
                walk(child, buffer, child_inline_ancestor);
            }
            if is_block {
                ensure_blank_line(buffer);
            }
        }
        _ => {}
    }
}

fn render_image(img: &ElementRef, buffer: &mut String) {
    let Some(src) = effective_src(img) else { return };
    let alt = img.value().attr("alt").unwrap_or("");
    ensure_blank_line(buffer);
    buffer.push_str(&format!("![{alt}]({src})"));
    buffer.push('\n');
}

fn suppress_image(img: &ElementRef, buffer: &mut String) {
    let alt = img.value().attr("alt").unwrap_or("");
    buffer.push_str(alt);
}

fn ensure_blank_line(buffer: &mut String) {
    if !buffer.is_empty() && !buffer.ends_with('\n') {
        buffer.push('\n');
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn renders_images_in_block_form() {
        let html = r#"<div class="rich_media_content"><p>Hello</p><img src="https://x/a.jpg" alt="pic"><p>World</p></div>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".rich_media_content").unwrap();
        let root = document.select(&selector).next().unwrap();
        let markdown = subtree_to_markdown(root);
        assert!(markdown.contains("Hello"));
        assert!(markdown.contains("![pic](https://x/a.jpg)"));
        assert!(markdown.contains("World"));
    }

    #[test]
    fn uses_data_src_for_lazy_placeholder() {
        let html = r#"<div class="rich_media_content"><img src="data:image/svg+xml;base64,AA==" data-src="https://x/real.jpg"></div>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".rich_media_content").unwrap();
        let root = document.select(&selector).next().unwrap();
        let markdown = subtree_to_markdown(root);
        assert!(markdown.contains("https://x/real.jpg"));
        assert!(!markdown.contains("data:image"));
    }

    #[test]
    fn suppresses_image_inside_inline_link_to_alt_text() {
        let html = r#"<div class="rich_media_content"><a href="https://x/"><img src="https://x/a.jpg" alt="icon"></a></div>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".rich_media_content").unwrap();
        let root = document.select(&selector).next().unwrap();
        let markdown = subtree_to_markdown(root);
        assert_eq!(markdown, "icon");
        assert!(!markdown.contains("![icon]"));
    }

    #[test]
    fn keeps_image_when_immediate_parent_is_section_or_span() {
        let html = r#"<div class="rich_media_content"><a href="https://x/"><span><img src="https://x/a.jpg" alt="pic"></span></a></div>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse(".rich_media_content").unwrap();
        let root = document.select(&selector).next().unwrap();
        let markdown = subtree_to_markdown(root);
        assert!(markdown.contains("![pic](https://x/a.jpg)"));
    }
}
