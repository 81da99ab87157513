// src/error.rs

//! Unified error handling for the scraper application.

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised by the fetch layer.
///
/// Timeout, Transport, ServerError and RateLimited are transient and
/// retried by the fetcher; ClientError is terminal for the request.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request timed out or was cancelled by the run deadline
    #[error("request timed out for {url}")]
    Timeout { url: String },

    /// Connection-level failure (reset, refused, DNS)
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Non-retryable 4xx response
    #[error("client error {status} for {url}")]
    ClientError { url: String, status: u16 },

    /// 5xx response after retries were exhausted
    #[error("server error {status} for {url}")]
    ServerError { url: String, status: u16 },

    /// 429 after retries were exhausted
    #[error("rate limited by server for {url}")]
    RateLimited { url: String },
}

impl FetchError {
    /// Short kind label for run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Transport { .. } => "transport",
            FetchError::ClientError { .. } => "client_error",
            FetchError::ServerError { .. } => "server_error",
            FetchError::RateLimited { .. } => "rate_limited",
        }
    }

    /// Whether the fetcher may retry after this error.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::ClientError { .. })
    }
}

/// Errors raised by the per-template extractors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A required section or container was not found (template changed)
    #[error("structure mismatch at {url}: {reason}")]
    StructureMismatch { url: String, reason: String },

    /// The page parsed but carried no extractable content
    #[error("empty page at {url}")]
    EmptyPage { url: String },
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::StructureMismatch { .. } => "structure_mismatch",
            ExtractionError::EmptyPage { .. } => "empty_page",
        }
    }
}

/// Errors raised by the persistence gateway.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Unique/check constraint rejected the write
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Connection to the database was lost
    #[error("database connection lost: {0}")]
    ConnectionLost(String),

    /// Any other backend failure
    #[error("database query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
                PersistenceError::ConstraintViolation(db.to_string())
            }
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                PersistenceError::ConnectionLost(e.to_string())
            }
            _ => PersistenceError::Query(e.to_string()),
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch layer failure
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// HTML could not be parsed into a document
    #[error("parse error for {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Extractor failure
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Persistence gateway failure
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// LLM resolver failure (never fatal for the pipeline)
    #[error("llm error: {0}")]
    Llm(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error for a page.
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a structure-mismatch extraction error.
    pub fn structure_mismatch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction(ExtractionError::StructureMismatch {
            url: url.into(),
            reason: reason.into(),
        })
    }

    /// Short kind label for run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Fetch(e) => e.kind(),
            AppError::Parse { .. } => "parse_error",
            AppError::Extraction(e) => e.kind(),
            AppError::Persistence(_) => "persistence_error",
            AppError::Llm(_) => "llm_error",
            AppError::Io(_) => "io_error",
            AppError::Json(_) => "json_error",
            AppError::Toml(_) => "toml_error",
            AppError::Url(_) => "url_error",
            AppError::Selector { .. } => "selector_error",
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_transience() {
        let timeout = FetchError::Timeout {
            url: "https://example.com".into(),
        };
        assert!(timeout.is_transient());

        let client = FetchError::ClientError {
            url: "https://example.com".into(),
            status: 404,
        };
        assert!(!client.is_transient());
    }

    #[test]
    fn test_error_kinds() {
        let e = AppError::structure_mismatch("https://example.com", "no vacancy table");
        assert_eq!(e.kind(), "structure_mismatch");

        let e: AppError = FetchError::RateLimited {
            url: "https://example.com".into(),
        }
        .into();
        assert_eq!(e.kind(), "rate_limited");
    }
}
