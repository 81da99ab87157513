// src/extract/recruitment.rs

//! Recruitment detail pages.
//!
//! The vacancy table is the one required section: a recruitment page
//! without it means the template changed. Dates, fees, age limits,
//! eligibility and selection process degrade to empty sub-collections
//! with a warning.

use scraper::Html;

use crate::error::{ExtractionError, Result};
use crate::models::{AgeLimit, DateEntry, FeeLine, Record, RecruitmentDetail, Vacancy};
use crate::parse::{inner_text, selector};

use super::{
    Extracted, PageContext, Section, collect_sections, find_section, header_field, page_title,
    parse_count, useful_links,
};

const CATEGORY_COLUMNS: [&str; 6] = ["ur", "gen", "obc", "sc", "st", "ews"];

pub(super) fn extract(doc: &Html, ctx: PageContext<'_>) -> Result<Extracted> {
    let mut warnings = Vec::new();
    let sections = collect_sections(doc)?;

    let vacancy_section = find_section(
        &sections,
        &["vacancy", "vacancies", "post detail", "total post"],
        "vacancy",
        &mut warnings,
    )
    .ok_or_else(|| ExtractionError::StructureMismatch {
        url: ctx.url.to_string(),
        reason: "vacancy table not found".into(),
    })?;
    let vacancies = parse_vacancies(vacancy_section);

    let important_dates = match find_section(
        &sections,
        &["important date", "dates"],
        "important dates",
        &mut warnings,
    ) {
        Some(section) => date_entries(section),
        None => {
            warnings.push("important dates section missing".into());
            Vec::new()
        }
    };

    let fees = match find_section(&sections, &["fee"], "application fee", &mut warnings) {
        Some(section) => section
            .kv_rows()
            .map(|(category, amount_text)| FeeLine {
                category: category.to_string(),
                amount_text,
                amount: None,
            })
            .collect(),
        None => {
            warnings.push("application fee section missing".into());
            Vec::new()
        }
    };

    let age_limits = match find_section(&sections, &["age"], "age limit", &mut warnings) {
        Some(section) => section
            .kv_rows()
            .map(|(category, text)| AgeLimit {
                category: category.to_string(),
                min_years: None,
                max_years: None,
                text,
            })
            .collect(),
        None => Vec::new(),
    };

    let selection_process = match find_section(
        &sections,
        &["selection", "mode of selection"],
        "selection process",
        &mut warnings,
    ) {
        Some(section) => section
            .rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| !c.to_lowercase().contains("selection"))
            .cloned()
            .collect(),
        None => selection_from_list(doc)?,
    };

    let eligibility = find_section(
        &sections,
        &["eligibility", "qualification"],
        "eligibility",
        &mut warnings,
    )
    .map(|section| {
        section
            .rows
            .iter()
            .map(|r| r.join(" "))
            .collect::<Vec<_>>()
            .join("; ")
    })
    .filter(|t| !t.is_empty());

    Ok(Extracted {
        record: Record::Recruitment(RecruitmentDetail {
            source_url: ctx.url.to_string(),
            fetched_at: ctx.fetched_at,
            title: page_title(doc)?,
            organization: header_field(&sections, &["organization", "board", "department"]),
            advt_no: header_field(&sections, &["advt", "advertisement", "notification no"]),
            total_posts: header_field(&sections, &["total post", "total vacanc"])
                .as_deref()
                .and_then(parse_count),
            vacancies,
            important_dates,
            fees,
            age_limits,
            eligibility,
            selection_process,
            useful_links: useful_links(doc, ctx.url)?,
        }),
        warnings,
    })
}

/// Parse the vacancy table into typed entries.
///
/// The header row decides the column layout: a "total"-ish column for
/// the count and any recognized category columns (UR/OBC/SC/ST/EWS)
/// for the breakdown.
fn parse_vacancies(section: &Section) -> Vec<Vacancy> {
    let Some((header, data)) = section.rows.split_first() else {
        return Vec::new();
    };

    let lower: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    let looks_like_header = lower
        .iter()
        .any(|h| h.contains("post") || h.contains("total") || h.contains("category"));
    let data: &[Vec<String>] = if looks_like_header {
        data
    } else {
        &section.rows
    };

    let total_idx = lower
        .iter()
        .position(|h| h.contains("total") || h.contains("no. of") || h.contains("count"));
    let category_idx: Vec<(usize, String)> = lower
        .iter()
        .enumerate()
        .filter(|(_, h)| CATEGORY_COLUMNS.iter().any(|c| h.as_str() == *c))
        .map(|(i, _)| (i, header[i].clone()))
        .collect();

    data.iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            let count_text = total_idx
                .and_then(|i| row.get(i))
                .or_else(|| row.get(1))
                .cloned()
                .unwrap_or_default();

            let mut breakdown = std::collections::BTreeMap::new();
            for (idx, name) in &category_idx {
                if let Some(n) = row.get(*idx).map(String::as_str).and_then(parse_count) {
                    breakdown.insert(name.clone(), n);
                }
            }

            Vacancy {
                post_name: row[0].clone(),
                count: parse_count(&count_text),
                count_text,
                category_breakdown: breakdown,
            }
        })
        .collect()
}

fn date_entries(section: &Section) -> Vec<DateEntry> {
    section
        .kv_rows()
        .map(|(label, value_text)| DateEntry {
            label: label.to_string(),
            value_text,
            value_iso: None,
        })
        .collect()
}

/// Selection stages sometimes come as an ordered list instead of a table.
fn selection_from_list(doc: &Html) -> Result<Vec<String>> {
    let ol_sel = selector("ol li")?;
    Ok(doc.select(&ol_sel).map(inner_text).take(8).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use chrono::Utc;

    const RECRUITMENT: &str = r#"
        <h1>UP Police Constable Recruitment 2026</h1>
        <table>
            <tr><td>Organization</td><td>UPPRPB</td></tr>
            <tr><td>Advt No.</td><td>05/2026</td></tr>
            <tr><td>Total Posts</td><td>60244</td></tr>
        </table>
        <h2>Important Dates</h2>
        <table>
            <tr><td>Apply Start</td><td>01 January 2026</td></tr>
            <tr><td>Last Date</td><td>15-01-2026</td></tr>
        </table>
        <h2>Vacancy Details</h2>
        <table>
            <tr><th>Post Name</th><th>UR</th><th>OBC</th><th>Total</th></tr>
            <tr><td>Constable</td><td>24102</td><td>16265</td><td>60244</td></tr>
            <tr><td>Head Constable</td><td>Various</td><td>-</td><td>Various</td></tr>
        </table>
        <h2>Application Fee</h2>
        <table>
            <tr><td>General / OBC</td><td>Rs. 400/-</td></tr>
            <tr><td>SC / ST</td><td>Rs. 200/-</td></tr>
        </table>
        <a href="/apply/">Apply Online</a>
    "#;

    fn ctx() -> PageContext<'static> {
        PageContext {
            url: "https://example.com/up-police-constable-recruitment-2026/",
            http_status: 200,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_recruitment_extraction() {
        let doc = parse_document(RECRUITMENT, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();

        let Record::Recruitment(detail) = extracted.record else {
            panic!("expected recruitment record");
        };
        assert_eq!(detail.organization.as_deref(), Some("UPPRPB"));
        assert_eq!(detail.advt_no.as_deref(), Some("05/2026"));
        assert_eq!(detail.total_posts, Some(60244));
        assert_eq!(detail.vacancies.len(), 2);
        assert_eq!(detail.vacancies[0].post_name, "Constable");
        assert_eq!(detail.vacancies[0].count, Some(60244));
        assert_eq!(
            detail.vacancies[0].category_breakdown.get("UR").copied(),
            Some(24102)
        );
        assert_eq!(detail.important_dates.len(), 2);
        assert_eq!(detail.fees.len(), 2);
        assert_eq!(detail.useful_links.len(), 1);
    }

    #[test]
    fn test_unparseable_count_is_kept_as_text() {
        let doc = parse_document(RECRUITMENT, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();

        let Record::Recruitment(detail) = extracted.record else {
            panic!("expected recruitment record");
        };
        assert_eq!(detail.vacancies[1].count, None);
        assert_eq!(detail.vacancies[1].count_text, "Various");
    }

    #[test]
    fn test_missing_vacancy_table_is_structure_mismatch() {
        let html = "<h1>Some Notice</h1><p>No tables here</p>";
        let doc = parse_document(html, "https://example.com").unwrap();
        let err = extract(&doc, ctx()).unwrap_err();
        assert_eq!(err.kind(), "structure_mismatch");
    }

    #[test]
    fn test_missing_optional_sections_warn() {
        let html = r#"
            <h1>Notice</h1>
            <h2>Vacancy Details</h2>
            <table><tr><th>Post</th><th>Total</th></tr><tr><td>Clerk</td><td>10</td></tr></table>
        "#;
        let doc = parse_document(html, "https://example.com").unwrap();
        let extracted = extract(&doc, ctx()).unwrap();

        let Record::Recruitment(detail) = extracted.record else {
            panic!("expected recruitment record");
        };
        assert!(detail.important_dates.is_empty());
        assert!(detail.fees.is_empty());
        assert!(
            extracted
                .warnings
                .iter()
                .any(|w| w.contains("important dates"))
        );
    }
}
