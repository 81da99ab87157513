// src/paginate.rs

//! Pagination driver for aggregator listing pages.
//!
//! Repeats fetch+extract cycles following the "next" control, merging
//! items across pages in first-seen order and deduplicating by detail
//! URL. Stops on: no next control, a repeated page (URL or body hash),
//! zero new items, or the configured page cap. Only a first-page
//! failure aborts the whole run.

use std::collections::HashSet;

use scraper::Html;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::extract::{self, Extracted, PageContext};
use crate::fetch::PageSource;
use crate::models::{AggregatorRecord, FetchOutcome, PageType, Record};
use crate::parse::{attr, inner_text, parse_document, selector};
use crate::utils::resolve;

/// Merged result of a pagination run.
#[derive(Debug)]
pub struct PaginatedListing {
    pub record: AggregatorRecord,
    pub warnings: Vec<String>,
    pub pages_fetched: u32,
}

/// Outcome of driving an aggregator listing.
#[derive(Debug)]
pub enum PaginationOutcome {
    Listing(PaginatedListing),
    /// First page returned 304; the stored record is still current.
    NotModified,
}

/// Drives repeated fetch+extract cycles over a paginated listing.
pub struct Paginator<'a, S: PageSource + ?Sized> {
    source: &'a S,
    max_pages: u32,
}

impl<'a, S: PageSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, max_pages: u32) -> Self {
        Self { source, max_pages }
    }

    pub async fn run(
        &self,
        page_type: PageType,
        start_url: &str,
        cancel: &CancellationToken,
    ) -> Result<PaginationOutcome> {
        if !page_type.is_aggregator() {
            return Err(AppError::validation(format!(
                "pagination only applies to aggregator pages, got {page_type}"
            )));
        }

        let mut warnings: Vec<String> = Vec::new();
        let mut merged: Option<AggregatorRecord> = None;
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_bodies: HashSet<String> = HashSet::new();
        let mut seen_items: HashSet<String> = HashSet::new();
        let mut pages_fetched = 0u32;

        let mut page_url = start_url.to_string();
        for page_no in 1..=self.max_pages {
            if !seen_urls.insert(page_url.clone()) {
                warnings.push(format!("pagination cycle detected at {page_url}; stopping"));
                break;
            }

            let first = page_no == 1;
            let page = match self.source.fetch(&page_url, cancel).await {
                Ok(FetchOutcome::Fetched(page)) => page,
                Ok(FetchOutcome::NotModified) if first => {
                    return Ok(PaginationOutcome::NotModified);
                }
                Ok(FetchOutcome::NotModified) => {
                    warnings.push(format!("page {page_no} unchanged; stopping"));
                    break;
                }
                Err(e) if first => return Err(e),
                Err(e) => {
                    warnings.push(format!("page {page_no} ({page_url}) failed: {e}"));
                    break;
                }
            };
            pages_fetched += 1;

            // body-hash cycle guard: some sites serve the last page for
            // every further page number
            let body_hash = hex::encode(Sha256::digest(page.body.as_bytes()));
            if !seen_bodies.insert(body_hash) {
                warnings.push(format!(
                    "page {page_no} repeats an earlier page body; stopping"
                ));
                break;
            }

            let doc = match parse_document(&page.body, &page.url) {
                Ok(doc) => doc,
                Err(e) if first => return Err(e),
                Err(e) => {
                    warnings.push(format!("page {page_no} unparseable: {e}"));
                    break;
                }
            };

            let ctx = PageContext::from_fetch(&page);
            let Extracted {
                record,
                warnings: page_warnings,
            } = match extract::extract(page_type, &doc, ctx) {
                Ok(extracted) => extracted,
                Err(e) if first => return Err(e),
                Err(e) => {
                    warnings.push(format!("page {page_no} extraction failed: {e}"));
                    break;
                }
            };
            warnings.extend(page_warnings);

            let Record::Aggregator(page_record) = record else {
                // extract() returns an aggregator record for aggregator
                // page types; anything else is unreachable
                break;
            };

            let added = if let Some(target) = merged.as_mut() {
                let mut added = 0;
                for item in page_record.items {
                    if seen_items.insert(item.detail_url.clone()) {
                        target.items.push(item);
                        added += 1;
                    }
                }
                added
            } else {
                for item in &page_record.items {
                    seen_items.insert(item.detail_url.clone());
                }
                let count = page_record.items.len();
                merged = Some(page_record);
                count
            };

            if !first && added == 0 {
                warnings.push(format!("page {page_no} added no new items; stopping"));
                break;
            }

            match find_next_url(&doc, &page.url)? {
                Some(next) => {
                    if page_no == self.max_pages {
                        warnings.push(format!(
                            "pagination stopped at the {}-page cap",
                            self.max_pages
                        ));
                    }
                    page_url = next;
                }
                None => break,
            }
        }

        let record = merged.ok_or_else(|| AppError::validation("pagination produced no pages"))?;
        Ok(PaginationOutcome::Listing(PaginatedListing {
            record,
            warnings,
            pages_fetched,
        }))
    }
}

/// Locate the "next page" control, if any.
fn find_next_url(doc: &Html, base_url: &str) -> Result<Option<String>> {
    let rel_next = selector("a[rel=\"next\"]")?;
    if let Some(href) = doc.select(&rel_next).next().and_then(|a| attr(a, "href")) {
        return Ok(Some(resolve(base_url, href).unwrap_or_else(|| href.to_string())));
    }

    let anchors = selector("a[href]")?;
    for a in doc.select(&anchors) {
        let text = inner_text(a).to_lowercase();
        let class = a.value().attr("class").unwrap_or("");
        let is_next = class
            .split_whitespace()
            .any(|c| matches!(c, "next" | "nextpostslink"))
            || text.starts_with("next")
            || text.contains("older posts")
            || text == "»";
        if is_next {
            if let Some(href) = attr(a, "href") {
                return Ok(Some(resolve(base_url, href).unwrap_or_else(|| href.to_string())));
            }
        }
    }
    Ok(None)
}
