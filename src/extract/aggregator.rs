// src/extract/aggregator.rs

//! Aggregator listing pages: jobs, results, admit cards, answer keys.
//!
//! Each item is a link to a detail page plus whatever metadata the
//! listing carries inline ("Last Date: 15 January 2026", "– Out",
//! "– Pending"). A missing metadata fragment degrades the single item;
//! a missing listing container fails the page (the template changed).

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::{ExtractionError, Result};
use crate::models::{AggregatorItem, AggregatorRecord, PageType, Record};
use crate::parse::{attr, inner_text, selector};
use crate::utils::resolve;

use super::{Extracted, PageContext, page_title};

/// Containers tried in order; the densest anchored list wins.
const CONTAINER_CANDIDATES: [&str; 4] = [
    "div.entry-content ul",
    "main ul",
    "article ul",
    "ul",
];

pub(super) fn extract(doc: &Html, ctx: PageContext<'_>, page_type: PageType) -> Result<Extracted> {
    let mut warnings = Vec::new();

    let container = find_listing_container(doc).ok_or_else(|| {
        ExtractionError::StructureMismatch {
            url: ctx.url.to_string(),
            reason: "listing container not found".into(),
        }
    })?;

    let item_sel = selector("li")?;
    let anchor_sel = selector("a[href]")?;

    let mut items = Vec::new();
    for li in container.select(&item_sel) {
        let Some(anchor) = li.select(&anchor_sel).next() else {
            continue;
        };
        let title = inner_text(anchor);
        let Some(href) = attr(anchor, "href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let detail_url = resolve(ctx.url, href).unwrap_or_else(|| href.to_string());
        let (metadata_value, category) = item_metadata(&title, &inner_text(li));
        if metadata_value.is_empty() {
            warnings.push(format!("item '{title}' carries no deadline or status"));
        }

        items.push(AggregatorItem {
            title,
            detail_url,
            metadata_value,
            category,
        });
    }

    if items.is_empty() {
        return Err(ExtractionError::EmptyPage {
            url: ctx.url.to_string(),
        }
        .into());
    }

    Ok(Extracted {
        record: Record::Aggregator(AggregatorRecord {
            page_type,
            source_url: ctx.url.to_string(),
            fetched_at: ctx.fetched_at,
            http_status: ctx.http_status,
            title: page_title(doc)?,
            items,
        }),
        warnings,
    })
}

/// The list element holding the most anchored items.
fn find_listing_container(doc: &Html) -> Option<ElementRef<'_>> {
    let anchor_sel = selector("li a[href]").ok()?;

    for candidate in CONTAINER_CANDIDATES {
        let Ok(sel) = selector(candidate) else {
            continue;
        };
        let best = doc
            .select(&sel)
            .map(|ul| (ul, ul.select(&anchor_sel).count()))
            .filter(|(_, n)| *n > 0)
            .max_by_key(|(_, n)| *n);
        if let Some((ul, _)) = best {
            return Some(ul);
        }
    }
    None
}

/// Inline metadata on a listing item: a deadline or a status suffix.
fn item_metadata(title: &str, full_text: &str) -> (String, String) {
    // "Last Date: 15 January 2026" / "Last Date: 15/01/2026"
    static LAST_DATE: &str = r"Last Date:?\s*(\d{1,2}[\s/.-]\w+[\s/.-]\d{4})";
    if let Ok(re) = Regex::new(LAST_DATE) {
        if let Some(caps) = re.captures(full_text) {
            return (caps[1].trim().to_string(), "last_date".into());
        }
    }

    // status suffixes use either a hyphen or an en dash
    for (suffix, value) in [("Out", "Out"), ("Pending", "Pending")] {
        for dash in ["– ", "- "] {
            if title.ends_with(&format!("{dash}{suffix}")) {
                return (value.to_string(), "status".into());
            }
        }
    }

    (String::new(), String::new())
}
