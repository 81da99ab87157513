// src/normalize/llm.rs

//! Optional LLM fallback for fields deterministic parsing cannot fill.
//!
//! Modeled as a collaborator interface with a disabled implementation so
//! the pipeline behaves identically whether the service is down or
//! turned off: the field stays unresolved, nothing else changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Config, OllamaConfig};

/// Fills structured fields from raw text on request.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    /// Whether calling `resolve` can possibly succeed.
    fn enabled(&self) -> bool;

    /// Ask for a JSON object matching the schema described in the prompt.
    async fn resolve(&self, prompt: &str) -> Result<Value>;
}

/// No-op resolver for deterministic-only operation.
pub struct DisabledResolver;

#[async_trait]
impl FieldResolver for DisabledResolver {
    fn enabled(&self) -> bool {
        false
    }

    async fn resolve(&self, _prompt: &str) -> Result<Value> {
        Err(AppError::Llm("llm fallback is disabled".into()))
    }
}

/// Resolver backed by a local Ollama server.
pub struct OllamaResolver {
    client: reqwest::Client,
    host: String,
    model: String,
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

impl OllamaResolver {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::config(format!("failed to build Ollama client: {e}")))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            num_predict: config.num_predict,
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl FieldResolver for OllamaResolver {
    fn enabled(&self) -> bool {
        true
    }

    async fn resolve(&self, prompt: &str) -> Result<Value> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.temperature,
                "top_p": self.top_p,
                "num_predict": self.num_predict,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("ollama request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Llm(format!(
                "ollama returned {}",
                response.status()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("ollama response unreadable: {e}")))?;

        serde_json::from_str(&generated.response)
            .map_err(|e| AppError::Llm(format!("ollama returned invalid JSON: {e}")))
    }
}

/// Build the resolver the configuration asks for.
pub fn resolver_from_config(config: &Config) -> Result<Arc<dyn FieldResolver>> {
    if config.ollama.enabled {
        Ok(Arc::new(OllamaResolver::new(&config.ollama)?))
    } else {
        Ok(Arc::new(DisabledResolver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_resolver_errors_without_network() {
        let resolver = DisabledResolver;
        assert!(!resolver.enabled());
        let err = resolver.resolve("anything").await.unwrap_err();
        assert_eq!(err.kind(), "llm_error");
    }

    #[test]
    fn test_resolver_from_config_respects_flag() {
        let config = Config::default();
        let resolver = resolver_from_config(&config).unwrap();
        assert!(!resolver.enabled());

        let mut config = Config::default();
        config.ollama.enabled = true;
        let resolver = resolver_from_config(&config).unwrap();
        assert!(resolver.enabled());
    }
}
