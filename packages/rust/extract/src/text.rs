//! HTML-to-plain-text conversion and length bounding.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::cleanup;

/// Elements whose whole subtree carries no readable text.
const SKIP_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "canvas", "object",
];

/// Elements that start a new line in rendered output.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td",
    "th", "tr", "ul",
];

/// Strip markup from an HTML document, keeping only human-readable text.
///
/// Script/style-like subtrees are dropped, block elements become line
/// breaks, and whitespace is normalized.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let mut raw = String::with_capacity(html.len() / 2);
    walk(doc.root_element(), &mut raw);

    let text = cleanup::run_pipeline(&raw);
    debug!(html_len = html.len(), text_len = text.len(), "html converted to text");
    text
}

fn walk(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    if SKIP_TAGS.contains(&name) {
        return;
    }

    let is_block = BLOCK_TAGS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
            }
            _ => {}
        }
    }

    if is_block {
        out.push('\n');
    }
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
