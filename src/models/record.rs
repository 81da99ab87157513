//! Typed records produced by the extractors.
//!
//! Records are value objects: the normalizer finalizes them and nothing
//! downstream mutates their fields. Each detail record exclusively owns
//! its sub-collections.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PageType;

/// A labeled hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

/// A labeled date, keeping the raw text next to the parsed value.
///
/// Unparseable date text stays verbatim in `value_text` with `value_iso`
/// unset; it is never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
    pub label: String,
    pub value_text: String,
    pub value_iso: Option<NaiveDate>,
}

/// An application fee line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    pub category: String,
    pub amount_text: String,
    pub amount: Option<f64>,
}

/// An age limit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeLimit {
    pub category: String,
    pub min_years: Option<u8>,
    pub max_years: Option<u8>,
    /// Raw cell text, kept for unparseable limits
    pub text: String,
}

/// A vacancy entry on a recruitment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacancy {
    pub post_name: String,
    /// Raw count cell text
    pub count_text: String,
    /// Parsed total, when resolvable
    pub count: Option<u32>,
    /// Per-category counts (UR/OBC/SC/ST/EWS)
    #[serde(default)]
    pub category_breakdown: BTreeMap<String, u32>,
}

impl Vacancy {
    /// Soft invariant: the category breakdown must not exceed the total.
    pub fn breakdown_consistent(&self) -> bool {
        match self.count {
            Some(total) => self.category_breakdown.values().sum::<u32>() <= total,
            None => true,
        }
    }
}

/// One item on an aggregator listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorItem {
    pub title: String,
    pub detail_url: String,
    /// Deadline or status string; empty when the listing carried none
    pub metadata_value: String,
    /// Kind of metadata: "last_date", "status", or empty
    pub category: String,
}

/// An aggregator listing page (jobs, results, admit cards, answer keys).
///
/// `items` preserve site display order. `page_type` is fixed at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorRecord {
    pub page_type: PageType,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub http_status: u16,
    pub title: Option<String>,
    pub items: Vec<AggregatorItem>,
}

/// A recruitment detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitmentDetail {
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub advt_no: Option<String>,
    pub total_posts: Option<u32>,
    pub vacancies: Vec<Vacancy>,
    pub important_dates: Vec<DateEntry>,
    pub fees: Vec<FeeLine>,
    pub age_limits: Vec<AgeLimit>,
    pub eligibility: Option<String>,
    /// Ordered stage names
    pub selection_process: Vec<String>,
    pub useful_links: Vec<Link>,
}

/// One row of a result/merit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeritEntry {
    pub label: String,
    pub value_text: String,
}

/// A result detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDetail {
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub exam_name: Option<String>,
    pub merit_entries: Vec<MeritEntry>,
    pub important_dates: Vec<DateEntry>,
    pub useful_links: Vec<Link>,
}

/// An answer-key detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyDetail {
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub exam_name: Option<String>,
    /// Links to the published key files
    pub key_files: Vec<Link>,
    /// Objection window and related dates
    pub important_dates: Vec<DateEntry>,
    pub useful_links: Vec<Link>,
}

/// One exam-city row (roll range or region mapped to a city).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamCityRow {
    pub label: String,
    pub city: String,
}

/// An exam-city notice page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamCityDetail {
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub exam_name: Option<String>,
    pub rows: Vec<ExamCityRow>,
    pub important_dates: Vec<DateEntry>,
    pub useful_links: Vec<Link>,
}

/// Tagged union over all record shapes, dispatched exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum Record {
    Aggregator(AggregatorRecord),
    Recruitment(RecruitmentDetail),
    Result(ResultDetail),
    AnswerKey(AnswerKeyDetail),
    ExamCity(ExamCityDetail),
}

impl Record {
    /// The page template this record came from.
    pub fn page_type(&self) -> PageType {
        match self {
            Record::Aggregator(r) => r.page_type,
            Record::Recruitment(_) => PageType::Recruitment,
            Record::Result(_) => PageType::Result,
            Record::AnswerKey(_) => PageType::AnswerKey,
            Record::ExamCity(_) => PageType::ExamCity,
        }
    }

    pub fn source_url(&self) -> &str {
        match self {
            Record::Aggregator(r) => &r.source_url,
            Record::Recruitment(r) => &r.source_url,
            Record::Result(r) => &r.source_url,
            Record::AnswerKey(r) => &r.source_url,
            Record::ExamCity(r) => &r.source_url,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Record::Aggregator(r) => r.title.as_deref(),
            Record::Recruitment(r) => r.title.as_deref(),
            Record::Result(r) => r.title.as_deref(),
            Record::AnswerKey(r) => r.title.as_deref(),
            Record::ExamCity(r) => r.title.as_deref(),
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            Record::Aggregator(r) => r.fetched_at,
            Record::Recruitment(r) => r.fetched_at,
            Record::Result(r) => r.fetched_at,
            Record::AnswerKey(r) => r.fetched_at,
            Record::ExamCity(r) => r.fetched_at,
        }
    }

    /// Natural identity key used for deduplication on upsert.
    ///
    /// Recruitments key on (organization, advt_no) when both are present;
    /// everything else keys on page type plus source URL.
    pub fn natural_key(&self) -> String {
        match self {
            Record::Recruitment(r) => match (&r.organization, &r.advt_no) {
                (Some(org), Some(advt)) if !org.is_empty() && !advt.is_empty() => {
                    format!("recruitment:{}|{}", org.to_lowercase(), advt.to_lowercase())
                }
                _ => format!("recruitment:{}", r.source_url),
            },
            other => format!("{}:{}", other.page_type(), other.source_url()),
        }
    }
}
