// src/extract/exam_city.rs

//! Exam-city / admit-card intimation pages.

use scraper::Html;

use crate::error::{ExtractionError, Result};
use crate::models::{DateEntry, ExamCityDetail, ExamCityRow, Record};

use super::{
    Extracted, PageContext, collect_sections, find_section, header_field, page_title, useful_links,
};

pub(super) fn extract(doc: &Html, ctx: PageContext<'_>) -> Result<Extracted> {
    let mut warnings = Vec::new();
    let sections = collect_sections(doc)?;

    let rows: Vec<ExamCityRow> = match find_section(
        &sections,
        &["exam city", "city intimation", "exam center", "exam centre"],
        "exam city",
        &mut warnings,
    ) {
        Some(section) => section
            .kv_rows()
            .map(|(label, city)| ExamCityRow {
                label: label.to_string(),
                city,
            })
            .collect(),
        None => Vec::new(),
    };

    let links = useful_links(doc, ctx.url)?;
    let has_intimation_link = links.iter().any(|l| {
        let label = l.label.to_lowercase();
        label.contains("exam city") || label.contains("admit")
    });
    if rows.is_empty() && !has_intimation_link {
        return Err(ExtractionError::StructureMismatch {
            url: ctx.url.to_string(),
            reason: "no exam-city rows or intimation link found".into(),
        }
        .into());
    }
    if rows.is_empty() {
        warnings.push("exam-city table missing; keeping intimation links only".into());
    }

    let important_dates: Vec<DateEntry> = find_section(&sections, &["date"], "dates", &mut warnings)
        .map(|section| {
            section
                .kv_rows()
                .map(|(label, value_text)| DateEntry {
                    label: label.to_string(),
                    value_text,
                    value_iso: None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Extracted {
        record: Record::ExamCity(ExamCityDetail {
            source_url: ctx.url.to_string(),
            fetched_at: ctx.fetched_at,
            title: page_title(doc)?,
            organization: header_field(&sections, &["organization", "board", "department"]),
            exam_name: header_field(&sections, &["exam name", "examination"]),
            rows,
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
            url: "https://example.com/ssc-gd-exam-city-2026/",
            http_status: 200,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_exam_city_rows() {
        let html = r#"
            <h1>SSC GD Exam City Details 2026</h1>
            <h2>Exam City Information</h2>
            <table>
                <tr><td>Roll 1000001 - 1050000</td><td>Lucknow</td></tr>
                <tr><td>Roll 1050001 - 1100000</td><td>Kanpur</td></tr>
            </table>
        "#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();

        let Record::ExamCity(detail) = extracted.record else {
            panic!("expected exam city record");
        };
        assert_eq!(detail.rows.len(), 2);
        assert_eq!(detail.rows[0].city, "Lucknow");
    }

    #[test]
    fn test_link_only_page_warns() {
        let html = r#"
            <h1>SSC GD Exam City 2026</h1>
            <a href="/city-check/">Check Exam City Here</a>
        "#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();
        assert!(!extracted.warnings.is_empty());
    }

    #[test]
    fn test_bare_page_is_structure_mismatch() {
        let doc = parse_document("<p>nothing</p>", "https://example.com").unwrap();
        let err = extract(&doc, ctx()).unwrap_err();
        assert_eq!(err.kind(), "structure_mismatch");
    }
}
