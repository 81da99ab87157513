// src/extract/answer_key.rs

//! Answer-key detail pages.

use scraper::Html;

use crate::error::{ExtractionError, Result};
use crate::models::{AnswerKeyDetail, DateEntry, Link, Record};

use super::{
    Extracted, PageContext, collect_sections, find_section, header_field, page_title, useful_links,
};

pub(super) fn extract(doc: &Html, ctx: PageContext<'_>) -> Result<Extracted> {
    let mut warnings = Vec::new();
    let sections = collect_sections(doc)?;
    let links = useful_links(doc, ctx.url)?;

    // The published key files are the point of the page; without them
    // the template has changed.
    let key_files: Vec<Link> = links
        .iter()
        .filter(|l| {
            let label = l.label.to_lowercase();
            label.contains("answer key") || l.url.to_lowercase().ends_with(".pdf")
        })
        .cloned()
        .collect();
    if key_files.is_empty() {
        return Err(ExtractionError::StructureMismatch {
            url: ctx.url.to_string(),
            reason: "no answer-key file links found".into(),
        }
        .into());
    }

    let important_dates: Vec<DateEntry> = match find_section(
        &sections,
        &["date", "objection"],
        "dates",
        &mut warnings,
    ) {
        Some(section) => section
            .kv_rows()
            .map(|(label, value_text)| DateEntry {
                label: label.to_string(),
                value_text,
                value_iso: None,
            })
            .collect(),
        None => {
            warnings.push("objection/date section missing".into());
            Vec::new()
        }
    };

    Ok(Extracted {
        record: Record::AnswerKey(AnswerKeyDetail {
            source_url: ctx.url.to_string(),
            fetched_at: ctx.fetched_at,
            title: page_title(doc)?,
            organization: header_field(&sections, &["organization", "board", "department"]),
            exam_name: header_field(&sections, &["exam name", "examination"]),
            key_files,
            important_dates,
            useful_links: links,
        }),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use chrono::Utc;

    fn ctx() -> PageContext<'static> {
        PageContext {
            url: "https://example.com/rrb-ntpc-answer-key-2026/",
            http_status: 200,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_answer_key_extraction() {
        let html = r#"
            <h1>RRB NTPC Answer Key 2026</h1>
            <h2>Objection Dates</h2>
            <table><tr><td>Objection Window</td><td>10-02-2026 to 15-02-2026</td></tr></table>
            <a href="/keys/ntpc-set-a.pdf">Answer Key Set A</a>
            <a href="/raise-objection/">Raise Objection (Official Link)</a>
        "#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();

        let Record::AnswerKey(detail) = extracted.record else {
            panic!("expected answer key record");
        };
        assert_eq!(detail.key_files.len(), 1);
        assert!(detail.key_files[0].url.ends_with("ntpc-set-a.pdf"));
        assert_eq!(detail.important_dates.len(), 1);
    }

    #[test]
    fn test_missing_key_files_is_structure_mismatch() {
        let html = r#"<h1>RRB NTPC Answer Key 2026</h1><a href="/apply/">Apply Online</a>"#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let err = extract(&doc, ctx()).unwrap_err();
        assert_eq!(err.kind(), "structure_mismatch");
    }
}
