//! Normalization outcomes and run summaries.

use serde::{Deserialize, Serialize};

use crate::models::Record;

/// Provenance of a normalized record's structured fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Every structured field resolved without LLM assistance
    Deterministic,
    /// At least one field was filled by the LLM and validated
    LlmAssisted,
    /// At least one required field could not be resolved
    Unresolved,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Deterministic => "deterministic",
            Confidence::LlmAssisted => "llm_assisted",
            Confidence::Unresolved => "unresolved",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deterministic" => Ok(Confidence::Deterministic),
            "llm_assisted" => Ok(Confidence::LlmAssisted),
            "unresolved" => Ok(Confidence::Unresolved),
            other => Err(format!("unknown confidence: {other}")),
        }
    }
}

/// A finalized record plus how its ambiguous fields were resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    pub record: Record,
    pub confidence: Confidence,
    /// Ordered warnings accumulated during extraction and normalization
    pub warnings: Vec<String>,
}

/// A single failed item in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub url: String,
    pub kind: String,
    pub message: String,
}

/// Per-run counters reported to the caller.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub warned: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl RunSummary {
    pub fn record_success(&mut self, warnings: &[String]) {
        self.succeeded += 1;
        if !warnings.is_empty() {
            self.warned += 1;
        }
    }

    pub fn record_failure(&mut self, url: impl Into<String>, error: &crate::error::AppError) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            url: url.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    /// Merge another summary into this one.
    pub fn absorb(&mut self, other: RunSummary) {
        self.succeeded += other.succeeded;
        self.warned += other.warned;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
