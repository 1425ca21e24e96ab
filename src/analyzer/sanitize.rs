//! Copy-on-extract sanitization of candidate fragments
//!
//! Accepted elements are serialized straight from the page tree into a new
//! string, skipping stripped subtrees and rewriting URLs on the way out. The
//! page itself is never mutated, so candidates never share state with each
//! other or with the page being scanned. Re-parsing a candidate on its own
//! would put it in a `<body>` context, where table rows and cells are dropped.

use crate::url::absolutize;
use scraper::{ElementRef, Node};
use url::Url;

/// Elements removed from every extracted fragment, together with their content
pub const STRIPPED_TAGS: &[&str] = &["script", "style", "iframe", "noscript"];

/// Attributes holding references that are rewritten to absolute URLs
const URL_ATTRIBUTES: &[&str] = &["src", "href"];

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Length cap, in characters, of the text preview on a candidate
pub const TEXT_PREVIEW_CHARS: usize = 100;

/// A sanitized, self-contained copy of one element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedFragment {
    /// Outer HTML of the copy after stripping and URL rewriting
    pub html: String,

    /// Trimmed visible text, truncated to the preview length
    pub text: String,
}

/// Copies an element into an independent tree and sanitizes the copy
///
/// The copy loses every `<script>`, `<style>`, `<iframe>` and `<noscript>`
/// subtree, and each relative `src`/`href` is resolved against `base_url`.
pub fn sanitize_element(element: ElementRef<'_>, base_url: &Url) -> SanitizedFragment {
    let mut html = String::new();
    write_element(element, base_url, &mut html);

    let mut text = String::new();
    collect_text(element, &mut text);

    SanitizedFragment {
        html,
        text: preview(&text),
    }
}

/// Returns the trimmed visible text of an element, ignoring stripped subtrees
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    text.trim().to_string()
}

fn is_stripped(name: &str) -> bool {
    STRIPPED_TAGS.contains(&name)
}

fn write_element(element: ElementRef<'_>, base_url: &Url, out: &mut String) {
    let name = element.value().name();
    if is_stripped(name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        let value = if URL_ATTRIBUTES.contains(&attr) {
            absolutize(value, base_url)
        } else {
            value.to_string()
        };
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&value));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    write_element(child_element, base_url, out);
                }
            }
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    if is_stripped(element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn preview(text: &str) -> String {
    text.trim().chars().take(TEXT_PREVIEW_CHARS).collect()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
