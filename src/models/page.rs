//! Page types and fetch results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page template kinds the scraper understands.
///
/// The four aggregator types list links to detail pages; the four detail
/// types describe a single recruitment, result, answer key or exam-city
/// notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Jobs,
    Results,
    AdmitCards,
    AnswerKeys,
    Recruitment,
    Result,
    AnswerKey,
    ExamCity,
}

impl PageType {
    /// Whether this type is an aggregator listing page.
    pub fn is_aggregator(&self) -> bool {
        matches!(
            self,
            PageType::Jobs | PageType::Results | PageType::AdmitCards | PageType::AnswerKeys
        )
    }

    /// The detail template linked from an aggregator page of this type.
    pub fn detail_type(&self) -> Option<PageType> {
        match self {
            PageType::Jobs => Some(PageType::Recruitment),
            PageType::Results => Some(PageType::Result),
            PageType::AdmitCards => Some(PageType::ExamCity),
            PageType::AnswerKeys => Some(PageType::AnswerKey),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Jobs => "jobs",
            PageType::Results => "results",
            PageType::AdmitCards => "admit_cards",
            PageType::AnswerKeys => "answer_keys",
            PageType::Recruitment => "recruitment",
            PageType::Result => "result",
            PageType::AnswerKey => "answer_key",
            PageType::ExamCity => "exam_city",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "jobs" | "latest_jobs" => Ok(PageType::Jobs),
            "results" => Ok(PageType::Results),
            "admit_cards" => Ok(PageType::AdmitCards),
            "answer_keys" => Ok(PageType::AnswerKeys),
            "recruitment" => Ok(PageType::Recruitment),
            "result" => Ok(PageType::Result),
            "answer_key" => Ok(PageType::AnswerKey),
            "exam_city" => Ok(PageType::ExamCity),
            other => Err(format!("unknown page type: {other}")),
        }
    }
}

/// A successfully fetched page.
///
/// Immutable once produced; the body is consumed by the parser and not
/// retained past extraction.
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    /// Requested URL
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    /// HTTP status code (always 2xx here)
    pub status: u16,
    /// Decoded response body
    pub body: String,
    /// ETag validator, if the server sent one
    pub etag: Option<String>,
    /// Last-Modified validator, if the server sent one
    pub last_modified: Option<String>,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of a fetch attempt.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Fresh page content
    Fetched(PageFetchResult),
    /// 304 against a known validator; caller reuses the stored record
    NotModified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_roundtrip() {
        for pt in [
            PageType::Jobs,
            PageType::Results,
            PageType::AdmitCards,
            PageType::AnswerKeys,
            PageType::Recruitment,
            PageType::Result,
            PageType::AnswerKey,
            PageType::ExamCity,
        ] {
            assert_eq!(pt.as_str().parse::<PageType>().unwrap(), pt);
        }
    }

    #[test]
    fn test_page_type_accepts_dashes() {
        assert_eq!("admit-cards".parse::<PageType>().unwrap(), PageType::AdmitCards);
    }

    #[test]
    fn test_aggregator_detail_mapping() {
        assert!(PageType::Jobs.is_aggregator());
        assert_eq!(PageType::Jobs.detail_type(), Some(PageType::Recruitment));
        assert_eq!(PageType::AdmitCards.detail_type(), Some(PageType::ExamCity));
        assert!(!PageType::Recruitment.is_aggregator());
        assert_eq!(PageType::Recruitment.detail_type(), None);
    }
}
