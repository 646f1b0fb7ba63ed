//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.textlens.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::models::AnalysisConfig;
use crate::orchestrator::{FailurePolicy, RunMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".textlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Generation backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Default analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// One request per task, or one combined request.
    #[serde(default)]
    pub mode: RunMode,

    /// Behaviour after a backend failure in per-task mode.
    #[serde(default)]
    pub policy: FailurePolicy,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Which generation service to talk to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Ollama,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::Ollama => "llama3.2:latest",
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend provider.
    #[serde(default)]
    pub provider: Provider,

    /// Model name; defaults per provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API base URL; defaults per provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the Gemini API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling probability mass.
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Top-k sampling cutoff.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Maximum tokens per reply.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl BackendConfig {
    /// Configured model, or the provider's default.
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Configured base URL, or the provider's default.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_timeout() -> u64 {
    120
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        // General settings
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(mode) = args.mode {
            self.general.mode = mode;
        }
        if let Some(policy) = args.policy {
            self.general.policy = policy;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        // Backend settings
        if let Some(provider) = args.provider {
            if provider != self.backend.provider {
                // Provider-specific settings from the file no longer apply.
                self.backend.model = None;
                self.backend.base_url = None;
            }
            self.backend.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.backend.model = Some(model.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.backend.base_url = Some(base_url.clone());
        }
        if let Some(temperature) = args.temperature {
            self.backend.temperature = temperature;
        }
        if let Some(top_p) = args.top_p {
            self.backend.top_p = top_p;
        }
        if let Some(top_k) = args.top_k {
            self.backend.top_k = top_k;
        }
        if let Some(max_output_tokens) = args.max_output_tokens {
            self.backend.max_output_tokens = max_output_tokens;
        }
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }

        // Analysis settings
        let analysis = &mut self.analysis;
        if let Some(ref language) = args.language {
            analysis.output_language = language.clone();
        }
        if let Some(sentences) = args.sentences {
            analysis.summary_sentences = sentences;
        }
        if let Some(key_points) = args.key_points {
            analysis.key_point_count = key_points;
        }
        if let Some(questions) = args.questions {
            analysis.qa_pair_count = questions;
        }
        if let Some(ref include) = args.include {
            analysis.include_keywords = include.clone();
        }
        if let Some(ref exclude) = args.exclude {
            analysis.exclude_keywords = exclude.clone();
        }
        if args.technical {
            analysis.technical_focus = true;
        }
        if args.neutral_tone {
            analysis.neutral_tone = true;
        }
        if let Some(ref tasks) = args.tasks {
            analysis.enabled_tasks = tasks.iter().copied().collect();
        }

        analysis.normalize_keywords();
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
