// src/normalize/mod.rs

//! Text cleaning, date parsing and LLM-assisted field resolution.
//!
//! Deterministic cleaning always runs first and is idempotent; the LLM
//! resolver is consulted only for required structured fields that
//! remain unresolved afterwards, and its output is validated before it
//! is trusted.

pub mod dates;
pub mod llm;

pub use llm::{DisabledResolver, FieldResolver, OllamaResolver, resolver_from_config};

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::extract::Extracted;
use crate::models::{
    AggregatorRecord, AnswerKeyDetail, Confidence, DateEntry, ExamCityDetail,
    NormalizationOutcome, Record, RecruitmentDetail, ResultDetail, Vacancy,
};
use crate::parse::collapse_whitespace;

/// Fold Unicode punctuation to ASCII and collapse whitespace.
///
/// Idempotent: applying it to its own output is a no-op.
pub fn clean_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{00A0}' => out.push(' '),
            '\u{2026}' => out.push_str("..."),
            _ => out.push(c),
        }
    }
    collapse_whitespace(&out)
}

fn clean_opt(s: Option<String>) -> Option<String> {
    s.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

#[derive(Default)]
struct ResolutionState {
    llm_used: bool,
    unresolved: bool,
}

impl ResolutionState {
    fn confidence(&self) -> Confidence {
        if self.unresolved {
            Confidence::Unresolved
        } else if self.llm_used {
            Confidence::LlmAssisted
        } else {
            Confidence::Deterministic
        }
    }
}

/// Turns raw extracted records into finalized, typed records.
pub struct Normalizer {
    resolver: Arc<dyn FieldResolver>,
}

impl Normalizer {
    pub fn new(resolver: Arc<dyn FieldResolver>) -> Self {
        Self { resolver }
    }

    /// A normalizer that never calls out to an LLM.
    pub fn deterministic_only() -> Self {
        Self::new(Arc::new(DisabledResolver))
    }

    pub async fn normalize(&self, extracted: Extracted) -> NormalizationOutcome {
        let Extracted {
            record,
            mut warnings,
        } = extracted;
        let mut state = ResolutionState::default();

        let record = match record {
            Record::Aggregator(r) => Record::Aggregator(normalize_aggregator(r, &mut warnings)),
            Record::Recruitment(r) => Record::Recruitment(
                self.normalize_recruitment(r, &mut warnings, &mut state).await,
            ),
            Record::Result(r) => Record::Result(normalize_result(r, &mut warnings)),
            Record::AnswerKey(r) => Record::AnswerKey(normalize_answer_key(r, &mut warnings)),
            Record::ExamCity(r) => Record::ExamCity(normalize_exam_city(r, &mut warnings)),
        };

        NormalizationOutcome {
            record,
            confidence: state.confidence(),
            warnings,
        }
    }

    async fn normalize_recruitment(
        &self,
        mut r: RecruitmentDetail,
        warnings: &mut Vec<String>,
        state: &mut ResolutionState,
    ) -> RecruitmentDetail {
        r.title = clean_opt(r.title);
        r.organization = clean_opt(r.organization);
        r.advt_no = clean_opt(r.advt_no);
        r.eligibility = clean_opt(r.eligibility);
        r.important_dates = normalize_dates(r.important_dates, warnings);

        for fee in &mut r.fees {
            fee.category = clean_text(&fee.category);
            fee.amount_text = clean_text(&fee.amount_text);
            if fee.amount.is_none() {
                fee.amount = parse_amount(&fee.amount_text);
            }
        }

        for age in &mut r.age_limits {
            age.category = clean_text(&age.category);
            age.text = clean_text(&age.text);
            if age.min_years.is_none() && age.max_years.is_none() {
                let (min, max) = parse_age_range(&age.text);
                age.min_years = min;
                age.max_years = max;
            }
        }

        r.selection_process = r
            .selection_process
            .into_iter()
            .map(|s| clean_text(&s))
            .filter(|s| !s.is_empty())
            .collect();

        for link in &mut r.useful_links {
            link.label = clean_text(&link.label);
        }

        let mut vacancies = Vec::with_capacity(r.vacancies.len());
        for vacancy in r.vacancies {
            vacancies.push(self.normalize_vacancy(vacancy, warnings, state).await);
        }
        r.vacancies = vacancies;

        if r.total_posts.is_none() {
            let counts: Vec<u32> = r.vacancies.iter().filter_map(|v| v.count).collect();
            if !counts.is_empty() && counts.len() == r.vacancies.len() {
                r.total_posts = Some(counts.iter().sum());
                warnings.push("total posts derived from vacancy rows".into());
            }
        }

        r
    }

    async fn normalize_vacancy(
        &self,
        mut v: Vacancy,
        warnings: &mut Vec<String>,
        state: &mut ResolutionState,
    ) -> Vacancy {
        v.post_name = clean_text(&v.post_name);
        v.count_text = clean_text(&v.count_text);

        if v.count.is_none() {
            v.count = crate::extract::parse_count(&v.count_text);
        }
        if v.count.is_none() && !v.count_text.is_empty() {
            match self.resolve_count(&v.post_name, &v.count_text).await {
                Some(n) => {
                    v.count = Some(n);
                    state.llm_used = true;
                    warnings.push(format!(
                        "vacancy count for '{}' resolved via llm",
                        v.post_name
                    ));
                }
                None => {
                    state.unresolved = true;
                    warnings.push(format!(
                        "vacancy count for '{}' unresolved from '{}'",
                        v.post_name, v.count_text
                    ));
                }
            }
        } else if v.count.is_none() {
            state.unresolved = true;
            warnings.push(format!("vacancy count for '{}' missing", v.post_name));
        }

        if !v.breakdown_consistent() {
            log::warn!(
                "category breakdown exceeds total for '{}' ({:?} > {:?})",
                v.post_name,
                v.category_breakdown.values().sum::<u32>(),
                v.count
            );
            warnings.push(format!(
                "category breakdown exceeds total count for '{}'",
                v.post_name
            ));
        }

        v
    }

    /// Ask the LLM for a count; any invalid or failed answer is None.
    async fn resolve_count(&self, post_name: &str, count_text: &str) -> Option<u32> {
        if !self.resolver.enabled() {
            return None;
        }
        let prompt = format!(
            "Extract the total number of vacancies from the text below. \
             Respond with exactly {{\"count\": <non-negative integer>}} and \
             nothing else; use {{\"count\": null}} if no number is stated.\n\n\
             Post: {post_name}\nText: {count_text}"
        );
        match self.resolver.resolve(&prompt).await {
            Ok(value) => validate_count(&value),
            Err(e) => {
                log::warn!("llm count resolution failed for '{post_name}': {e}");
                None
            }
        }
    }
}

/// Accept only a non-negative integer within a sane range.
fn validate_count(value: &Value) -> Option<u32> {
    let n = value.get("count")?.as_u64()?;
    u32::try_from(n).ok().filter(|n| *n <= 10_000_000)
}

fn normalize_aggregator(mut r: AggregatorRecord, warnings: &mut Vec<String>) -> AggregatorRecord {
    r.title = clean_opt(r.title);
    for item in &mut r.items {
        item.title = clean_text(&item.title);
        item.metadata_value = clean_text(&item.metadata_value);
        if item.category == "last_date"
            && !item.metadata_value.is_empty()
            && dates::parse_indian_date(&item.metadata_value).is_none()
        {
            warnings.push(format!(
                "deadline '{}' on '{}' not parseable; kept verbatim",
                item.metadata_value, item.title
            ));
        }
    }
    r
}

fn normalize_result(mut r: ResultDetail, warnings: &mut Vec<String>) -> ResultDetail {
    r.title = clean_opt(r.title);
    r.organization = clean_opt(r.organization);
    r.exam_name = clean_opt(r.exam_name);
    r.important_dates = normalize_dates(r.important_dates, warnings);
    for entry in &mut r.merit_entries {
        entry.label = clean_text(&entry.label);
        entry.value_text = clean_text(&entry.value_text);
    }
    for link in &mut r.useful_links {
        link.label = clean_text(&link.label);
    }
    r
}

fn normalize_answer_key(mut r: AnswerKeyDetail, warnings: &mut Vec<String>) -> AnswerKeyDetail {
    r.title = clean_opt(r.title);
    r.organization = clean_opt(r.organization);
    r.exam_name = clean_opt(r.exam_name);
    r.important_dates = normalize_dates(r.important_dates, warnings);
    for link in r.key_files.iter_mut().chain(r.useful_links.iter_mut()) {
        link.label = clean_text(&link.label);
    }
    r
}

fn normalize_exam_city(mut r: ExamCityDetail, warnings: &mut Vec<String>) -> ExamCityDetail {
    r.title = clean_opt(r.title);
    r.organization = clean_opt(r.organization);
    r.exam_name = clean_opt(r.exam_name);
    r.important_dates = normalize_dates(r.important_dates, warnings);
    for row in &mut r.rows {
        row.label = clean_text(&row.label);
        row.city = clean_text(&row.city);
    }
    for link in &mut r.useful_links {
        link.label = clean_text(&link.label);
    }
    r
}

/// Clean date entries and fill `value_iso` where the text parses.
///
/// Unparseable text stays verbatim with a warning.
fn normalize_dates(entries: Vec<DateEntry>, warnings: &mut Vec<String>) -> Vec<DateEntry> {
    entries
        .into_iter()
        .map(|mut entry| {
            entry.label = clean_text(&entry.label);
            entry.value_text = clean_text(&entry.value_text);
            if entry.value_iso.is_none() {
                entry.value_iso = dates::parse_indian_date(&entry.value_text);
                if entry.value_iso.is_none() && !entry.value_text.is_empty() {
                    warnings.push(format!(
                        "date '{}' ({}) not parseable; kept verbatim",
                        entry.value_text, entry.label
                    ));
                }
            }
            entry
        })
        .collect()
}

fn parse_amount(text: &str) -> Option<f64> {
    let re = Regex::new(r"(\d[\d,]*(?:\.\d+)?)").ok()?;
    let caps = re.captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

fn parse_age_range(text: &str) -> (Option<u8>, Option<u8>) {
    if let Ok(re) = Regex::new(r"(\d{1,2})\s*(?:-|to)\s*(\d{1,2})") {
        if let Some(caps) = re.captures(text) {
            return (caps[1].parse().ok(), caps[2].parse().ok());
        }
    }
    if let Ok(re) = Regex::new(r"(?i)max(?:imum)?\D{0,10}(\d{1,2})") {
        if let Some(caps) = re.captures(text) {
            return (None, caps[1].parse().ok());
        }
    }
    if let Ok(re) = Regex::new(r"(?i)min(?:imum)?\D{0,10}(\d{1,2})") {
        if let Some(caps) = re.captures(text) {
            return (caps[1].parse().ok(), None);
        }
    }
    (None, None)
}
