// src/parse.rs

//! HTML parsing primitives.
//!
//! Thin wrapper over `scraper` exposing the handful of operations the
//! extractors need: document parsing, selector compilation and
//! whitespace-collapsed text access. Pure functions, no network or state.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};

/// Parse raw HTML into a queryable document.
///
/// Empty or whitespace-only input is a `Parse` error; the html5ever
/// tree builder accepts anything else.
pub fn parse_document(html: &str, url: &str) -> Result<Html> {
    if html.trim().is_empty() {
        return Err(AppError::parse(url, "empty document"));
    }
    Ok(Html::parse_document(html))
}

/// Compile a CSS selector.
pub fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collect an element's text with whitespace collapsed.
pub fn inner_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&raw)
}

/// An element attribute, trimmed, or None when absent/empty.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(parse_document("", "https://example.com").is_err());
        assert!(parse_document("   \n\t ", "https://example.com").is_err());
    }

    #[test]
    fn test_parse_accepts_fragmentary_html() {
        let doc = parse_document("<ul><li>one</li></ul>", "https://example.com").unwrap();
        let sel = selector("li").unwrap();
        assert_eq!(doc.select(&sel).count(), 1);
    }

    #[test]
    fn test_selector_invalid() {
        assert!(selector("[[invalid").is_err());
    }

    #[test]
    fn test_inner_text_collapses_whitespace() {
        let doc = parse_document(
            "<p>UP Police\n\n   Constable <b> Recruitment </b> 2026</p>",
            "https://example.com",
        )
        .unwrap();
        let sel = selector("p").unwrap();
        let el = doc.select(&sel).next().unwrap();
        assert_eq!(inner_text(el), "UP Police Constable Recruitment 2026");
    }

    #[test]
    fn test_attr_trims_and_filters_empty() {
        let doc = parse_document(
            r#"<a href=" /page/ ">x</a><a href="">y</a>"#,
            "https://example.com",
        )
        .unwrap();
        let sel = selector("a").unwrap();
        let mut anchors = doc.select(&sel);
        assert_eq!(attr(anchors.next().unwrap(), "href"), Some("/page/"));
        assert_eq!(attr(anchors.next().unwrap(), "href"), None);
    }
}
