//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::PageType;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and fetch behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Scraping behavior settings
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Ollama LLM fallback settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.base_url.trim().is_empty() {
            return Err(AppError::validation("http.base_url is empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.concurrent_jobs == 0 {
            return Err(AppError::validation("http.concurrent_jobs must be > 0"));
        }
        if self.http.request_delay_secs == 0 {
            return Err(AppError::validation("http.request_delay_secs must be > 0"));
        }
        if self.scrape.max_pages == 0 {
            return Err(AppError::validation("scrape.max_pages must be > 0"));
        }
        if self.ollama.enabled && self.ollama.host.trim().is_empty() {
            return Err(AppError::validation(
                "ollama.host is empty while ollama.enabled is set",
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(AppError::validation("database.url is empty"));
        }
        Ok(())
    }

    /// Default listing URL for an aggregator page type.
    ///
    /// Returns None for detail page types, which have no fixed URL.
    pub fn aggregator_url(&self, page_type: PageType) -> Option<String> {
        let path = match page_type {
            PageType::Jobs => "latest-jobs/",
            PageType::Results => "result/",
            PageType::AdmitCards => "admit-card/",
            PageType::AnswerKeys => "answer-key/",
            _ => return None,
        };
        let base = self.http.base_url.trim_end_matches('/');
        Some(format!("{}/{}", base, path))
    }
}

/// HTTP client and fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Root URL of the scraped site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Maximum concurrent in-flight requests
    #[serde(default = "defaults::concurrent_jobs")]
    pub concurrent_jobs: usize,

    /// Minimum delay between requests to the same host, in seconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_secs: u64,

    /// Deadline for a whole pipeline run, in seconds
    #[serde(default = "defaults::run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            concurrent_jobs: defaults::concurrent_jobs(),
            request_delay_secs: defaults::request_delay(),
            run_timeout_secs: defaults::run_timeout(),
        }
    }
}

/// Scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Safety cap on pages followed during pagination
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Whether aggregator runs also fetch linked detail pages
    #[serde(default = "defaults::follow_details")]
    pub follow_details: bool,

    /// Cap on detail pages fetched per aggregator run
    #[serde(default = "defaults::max_details")]
    pub max_details: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::max_pages(),
            follow_details: defaults::follow_details(),
            max_details: defaults::max_details(),
        }
    }
}

/// Ollama LLM fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Whether the LLM fallback is enabled at all
    #[serde(default)]
    pub enabled: bool,

    /// Ollama server base URL
    #[serde(default = "defaults::ollama_host")]
    pub host: String,

    /// Model name passed to the generate endpoint
    #[serde(default = "defaults::ollama_model")]
    pub model: String,

    #[serde(default = "defaults::ollama_temperature")]
    pub temperature: f32,

    #[serde(default = "defaults::ollama_top_p")]
    pub top_p: f32,

    #[serde(default = "defaults::ollama_num_predict")]
    pub num_predict: u32,

    /// Request timeout for the generate call, in seconds
    #[serde(default = "defaults::ollama_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: defaults::ollama_host(),
            model: defaults::ollama_model(),
            temperature: defaults::ollama_temperature(),
            top_p: defaults::ollama_top_p(),
            num_predict: defaults::ollama_num_predict(),
            timeout_secs: defaults::ollama_timeout(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    #[serde(default = "defaults::db_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::db_url(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn base_url() -> String {
        "https://sarkariresult.com.cm".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; SarkariCrawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn concurrent_jobs() -> usize {
        3
    }
    pub fn request_delay() -> u64 {
        5
    }
    pub fn run_timeout() -> u64 {
        600
    }

    // Scrape defaults
    pub fn max_pages() -> u32 {
        50
    }
    pub fn follow_details() -> bool {
        false
    }
    pub fn max_details() -> usize {
        20
    }

    // Ollama defaults
    pub fn ollama_host() -> String {
        "http://localhost:11434".into()
    }
    pub fn ollama_model() -> String {
        "llama3.1".into()
    }
    pub fn ollama_temperature() -> f32 {
        0.3
    }
    pub fn ollama_top_p() -> f32 {
        0.9
    }
    pub fn ollama_num_predict() -> u32 {
        500
    }
    pub fn ollama_timeout() -> u64 {
        60
    }

    // Database defaults
    pub fn db_url() -> String {
        "sqlite://sarkari.db".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.http.concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_host_when_ollama_enabled() {
        let mut config = Config::default();
        config.ollama.enabled = true;
        config.ollama.host = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn aggregator_url_per_page_type() {
        let config = Config::default();
        assert_eq!(
            config.aggregator_url(PageType::Jobs).unwrap(),
            "https://sarkariresult.com.cm/latest-jobs/"
        );
        assert_eq!(
            config.aggregator_url(PageType::AnswerKeys).unwrap(),
            "https://sarkariresult.com.cm/answer-key/"
        );
        assert!(config.aggregator_url(PageType::Recruitment).is_none());
    }
}
