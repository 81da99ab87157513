// src/extract/result.rs

//! Result detail pages.

use scraper::Html;

use crate::error::{ExtractionError, Result};
use crate::models::{MeritEntry, Record, ResultDetail};

use super::{
    Extracted, PageContext, collect_sections, find_section, header_field, page_title, useful_links,
};

pub(super) fn extract(doc: &Html, ctx: PageContext<'_>) -> Result<Extracted> {
    let mut warnings = Vec::new();
    let sections = collect_sections(doc)?;
    let links = useful_links(doc, ctx.url)?;

    let merit_entries: Vec<MeritEntry> = match find_section(
        &sections,
        &["result", "merit", "cut off", "cutoff"],
        "result",
        &mut warnings,
    ) {
        Some(section) => section
            .kv_rows()
            .map(|(label, value_text)| MeritEntry {
                label: label.to_string(),
                value_text,
            })
            .collect(),
        None => {
            warnings.push("result table missing; keeping download links only".into());
            Vec::new()
        }
    };

    // A result page with neither a merit table nor a result link is a
    // changed template, not an empty result.
    let has_result_link = links
        .iter()
        .any(|l| l.label.to_lowercase().contains("result"));
    if merit_entries.is_empty() && !has_result_link {
        return Err(ExtractionError::StructureMismatch {
            url: ctx.url.to_string(),
            reason: "no result table or result link found".into(),
        }
        .into());
    }

    let important_dates = find_section(&sections, &["date"], "dates", &mut warnings)
        .map(|section| {
            section
                .kv_rows()
                .map(|(label, value_text)| crate::models::DateEntry {
                    label: label.to_string(),
                    value_text,
                    value_iso: None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Extracted {
        record: Record::Result(ResultDetail {
            source_url: ctx.url.to_string(),
            fetched_at: ctx.fetched_at,
            title: page_title(doc)?,
            organization: header_field(&sections, &["organization", "board", "department"]),
            exam_name: header_field(&sections, &["exam name", "examination"]),
            merit_entries,
            important_dates,
            useful_links: links,
        }),
        warnings,
    })
}
