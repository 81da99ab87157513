// src/extract/mod.rs

//! Template-specific extraction of parsed pages into raw records.
//!
//! One extractor per page template, dispatched through a single entry
//! point over the page-type union so callers get exhaustive-match
//! coverage. Extractors walk the parsed tree only; normalization of the
//! extracted text happens later.

mod aggregator;
mod answer_key;
mod exam_city;
mod recruitment;
mod result;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{Link, PageFetchResult, PageType, Record};
use crate::parse::{inner_text, selector};
use crate::utils::resolve;

/// A raw record plus the warnings collected while extracting it.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub record: Record,
    pub warnings: Vec<String>,
}

/// Fetch metadata the extractors copy into records.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub url: &'a str,
    pub http_status: u16,
    pub fetched_at: DateTime<Utc>,
}

impl<'a> PageContext<'a> {
    pub fn from_fetch(page: &'a PageFetchResult) -> Self {
        Self {
            url: &page.url,
            http_status: page.status,
            fetched_at: page.fetched_at,
        }
    }
}

/// Extract a raw record of the given template from a parsed page.
pub fn extract(page_type: PageType, doc: &Html, ctx: PageContext<'_>) -> Result<Extracted> {
    match page_type {
        PageType::Jobs | PageType::Results | PageType::AdmitCards | PageType::AnswerKeys => {
            aggregator::extract(doc, ctx, page_type)
        }
        PageType::Recruitment => recruitment::extract(doc, ctx),
        PageType::Result => result::extract(doc, ctx),
        PageType::AnswerKey => answer_key::extract(doc, ctx),
        PageType::ExamCity => exam_city::extract(doc, ctx),
    }
}

// --- Shared tree-walking helpers ---

/// A table and the heading text that introduces it.
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub heading: Option<String>,
    pub rows: Vec<Vec<String>>,
}

impl Section {
    /// Rows interpreted as label/value pairs.
    pub fn kv_rows(&self) -> impl Iterator<Item = (&str, String)> {
        self.rows.iter().filter(|r| r.len() >= 2).map(|r| {
            let value = r[1..].join(" ");
            (r[0].as_str(), value.trim().to_string())
        })
    }
}

/// Collect every table in document order with its nearest preceding
/// heading.
pub(crate) fn collect_sections(doc: &Html) -> Result<Vec<Section>> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td, th")?;
    let heading_sel = selector("h2, h3, h4")?;

    let mut sections = Vec::new();
    for table in doc.select(&table_sel) {
        let mut rows = Vec::new();
        for tr in table.select(&row_sel) {
            let cells: Vec<String> = tr
                .select(&cell_sel)
                .map(inner_text)
                .filter(|c| !c.is_empty())
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
        sections.push(Section {
            heading: nearest_heading(table, &heading_sel),
            rows,
        });
    }
    Ok(sections)
}

/// Walk backwards from a table (previous siblings, then up through
/// ancestors) to the closest heading element.
fn nearest_heading(table: ElementRef<'_>, heading_sel: &Selector) -> Option<String> {
    for scope in std::iter::successors(Some(*table), |n| n.parent()) {
        for sib in scope.prev_siblings() {
            if let Some(el) = ElementRef::wrap(sib) {
                if matches!(el.value().name(), "h2" | "h3" | "h4") {
                    return Some(inner_text(el));
                }
                // a wrapper may end with the heading we want
                if let Some(h) = el.select(heading_sel).last() {
                    return Some(inner_text(h));
                }
            }
        }
    }
    None
}

/// Find the section whose heading matches any of the keywords.
///
/// Ambiguous matches resolve to the first in document order with a
/// recorded warning.
pub(crate) fn find_section<'a>(
    sections: &'a [Section],
    keywords: &[&str],
    label: &str,
    warnings: &mut Vec<String>,
) -> Option<&'a Section> {
    let mut matches = sections.iter().filter(|s| {
        s.heading
            .as_deref()
            .map(|h| {
                let h = h.to_lowercase();
                keywords.iter().any(|k| h.contains(k))
            })
            .unwrap_or(false)
    });

    let first = matches.next()?;
    if matches.next().is_some() {
        warnings.push(format!(
            "multiple sections match '{label}'; using the first in document order"
        ));
    }
    Some(first)
}

/// First h1 text, used as the page title.
pub(crate) fn page_title(doc: &Html) -> Result<Option<String>> {
    let h1 = selector("h1")?;
    Ok(doc.select(&h1).next().map(inner_text).filter(|t| !t.is_empty()))
}

/// Scan label/value rows across all sections for a header field.
pub(crate) fn header_field(sections: &[Section], keywords: &[&str]) -> Option<String> {
    for section in sections {
        for (label, value) in section.kv_rows() {
            let label = label.to_lowercase();
            if keywords.iter().any(|k| label.contains(k)) && !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

const LINK_KEYWORDS: [&str; 9] = [
    "apply",
    "official",
    "notification",
    "admit",
    "result",
    "download",
    "answer key",
    "exam city",
    "syllabus",
];

/// Anchors worth keeping from a detail page, resolved against the page
/// URL and deduplicated by target.
pub(crate) fn useful_links(doc: &Html, base_url: &str) -> Result<Vec<Link>> {
    let anchor_sel = selector("a[href]")?;
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&anchor_sel) {
        let label = inner_text(a);
        if label.len() <= 3 {
            continue;
        }
        let lower = label.to_lowercase();
        if !LINK_KEYWORDS.iter().any(|k| lower.contains(k)) {
            continue;
        }
        let Some(href) = crate::parse::attr(a, "href") else {
            continue;
        };
        let url = resolve(base_url, href).unwrap_or_else(|| href.to_string());
        if seen.insert(url.clone()) {
            links.push(Link { label, url });
        }
    }
    Ok(links)
}

/// Pull the first integer out of a text cell.
pub(crate) fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;

    const SECTIONED: &str = r#"
        <h1>UP Police Constable Recruitment 2026</h1>
        <h2>Important Dates</h2>
        <table><tr><td>Apply Start</td><td>01 January 2026</td></tr></table>
        <div>
            <h3>Vacancy Details</h3>
            <table>
                <tr><th>Post</th><th>Total</th></tr>
                <tr><td>Constable</td><td>60244</td></tr>
            </table>
        </div>
        <h2>Other Dates</h2>
        <table><tr><td>Exam Date</td><td>15-03-2026</td></tr></table>
    "#;

    #[test]
    fn test_collect_sections_with_headings() {
        let doc = parse_document(SECTIONED, "https://example.com").unwrap();
        let sections = collect_sections(&doc).unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading.as_deref(), Some("Important Dates"));
        assert_eq!(sections[1].heading.as_deref(), Some("Vacancy Details"));
        assert_eq!(sections[1].rows[1], vec!["Constable", "60244"]);
    }

    #[test]
    fn test_find_section_prefers_first_and_warns() {
        let doc = parse_document(SECTIONED, "https://example.com").unwrap();
        let sections = collect_sections(&doc).unwrap();
        let mut warnings = Vec::new();

        let dates = find_section(&sections, &["date"], "dates", &mut warnings).unwrap();
        assert_eq!(dates.heading.as_deref(), Some("Important Dates"));
        assert_eq!(warnings.len(), 1);

        let vacancy = find_section(&sections, &["vacancy"], "vacancy", &mut warnings).unwrap();
        assert_eq!(vacancy.heading.as_deref(), Some("Vacancy Details"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_useful_links_filters_and_resolves() {
        let html = r#"
            <a href="/apply-online/">Apply Online</a>
            <a href="https://upprpb.gov.in/">Official Website</a>
            <a href="/contact/">Contact Us</a>
            <a href="/apply-online/">Apply Online (mirror)</a>
        "#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let links = useful_links(&doc, "https://example.com/up-police/").unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://example.com/apply-online/");
        assert_eq!(links[1].label, "Official Website");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("60244"), Some(60244));
        assert_eq!(parse_count("Total 60,244 Posts"), Some(60244));
        assert_eq!(parse_count("Various"), None);
    }
}
