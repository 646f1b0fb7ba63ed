//! Ollama `/api/generate` client.

use super::{status_error, transport_error, GenerationBackend, GenerationOptions};
use crate::error::BackendError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Ollama generate API request.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
}

/// Ollama generate API response.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
    #[allow(dead_code)] // Response field, only non-streaming requests are made
    #[serde(default)]
    done: bool,
}

/// Client for a local or remote Ollama server.
pub struct OllamaBackend {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_seconds: u64,
}

impl OllamaBackend {
    pub fn new(base_url: String, model: String, timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout_seconds,
        })
    }
}

impl GenerationBackend for OllamaBackend {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("POST {} ({} prompt bytes)", url, prompt.len());

        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                top_k: options.top_k,
                num_predict: options.max_output_tokens,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, &self.base_url, self.timeout_seconds))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::new(format!("Failed to parse Ollama response: {}", e)))?;

        if body.response.trim().is_empty() {
            return Err(BackendError::new("Backend returned an empty response"));
        }

        Ok(body.response)
    }

    fn describe(&self) -> String {
        format!("ollama ({})", self.model)
    }
}
