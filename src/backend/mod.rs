//! Text-generation backends.
//!
//! The orchestrator only sees [`GenerationBackend`]: an instruction and
//! sampling options go in, raw reply text comes out. HTTP clients for
//! Gemini and Ollama are provided, selected from configuration.

pub mod gemini;
#[cfg(test)]
pub mod mock;
pub mod ollama;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

use crate::config::{BackendConfig, Provider};
use crate::error::BackendError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Sampling parameters passed with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

impl From<&BackendConfig> for GenerationOptions {
    fn from(config: &BackendConfig) -> Self {
        Self {
            temperature: config.temperature as f32,
            top_p: config.top_p as f32,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// An external text-generation service.
///
/// Implementations must report a non-success response, or a reply
/// without text, as a [`BackendError`], never as an empty `Ok`.
pub trait GenerationBackend {
    fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Short human-readable description, e.g. `gemini (gemini-1.5-flash)`.
    fn describe(&self) -> String;
}

/// Backend chosen at runtime from configuration.
pub enum Backend {
    Gemini(GeminiBackend),
    Ollama(OllamaBackend),
}

impl Backend {
    /// Build the configured backend.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        match config.provider {
            Provider::Gemini => {
                let api_key = std::env::var(&config.api_key_env).with_context(|| {
                    format!(
                        "Gemini API key not found; set the {} environment variable",
                        config.api_key_env
                    )
                })?;
                Ok(Backend::Gemini(GeminiBackend::new(
                    config.base_url(),
                    config.model(),
                    api_key,
                    config.timeout_seconds,
                )?))
            }
            Provider::Ollama => Ok(Backend::Ollama(OllamaBackend::new(
                config.base_url(),
                config.model(),
                config.timeout_seconds,
            )?)),
        }
    }
}

impl GenerationBackend for Backend {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, BackendError> {
        match self {
            Backend::Gemini(backend) => backend.generate(prompt, options).await,
            Backend::Ollama(backend) => backend.generate(prompt, options).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Backend::Gemini(backend) => backend.describe(),
            Backend::Ollama(backend) => backend.describe(),
        }
    }
}

/// Turn a transport error into a readable backend error.
pub(crate) fn transport_error(
    e: reqwest::Error,
    base_url: &str,
    timeout_seconds: u64,
) -> BackendError {
    if e.is_timeout() {
        BackendError::new(format!("Request timed out after {}s", timeout_seconds))
    } else if e.is_connect() {
        BackendError::new(format!("Cannot connect to backend at {}", base_url))
    } else {
        BackendError::new(format!("Failed to send request: {}", e))
    }
}

/// Turn a non-success HTTP response into a backend error.
pub(crate) async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    BackendError::new(format!("Backend API error {}: {}", status, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = BackendConfig {
            temperature: 0.2,
            top_k: 10,
            ..BackendConfig::default()
        };
        let options = GenerationOptions::from(&config);
        assert_eq!(options.temperature, 0.2);
        assert_eq!(options.top_k, 10);
        assert_eq!(options.max_output_tokens, config.max_output_tokens);
    }

    #[test]
    fn test_ollama_from_config_needs_no_key() {
        let config = BackendConfig {
            provider: Provider::Ollama,
            base_url: Some("http://localhost:11434".to_string()),
            ..BackendConfig::default()
        };
        let backend = Backend::from_config(&config).unwrap();
        assert!(backend.describe().starts_with("ollama"));
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = BackendConfig {
            api_key_env: "TEXTLENS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..BackendConfig::default()
        };
        let err = Backend::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("TEXTLENS_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
