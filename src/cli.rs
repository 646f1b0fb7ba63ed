//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::Provider;
use crate::models::TaskKind;
use crate::orchestrator::{FailurePolicy, RunMode};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TextLens - LLM-powered text analysis
///
/// Summarize text and extract key points, sentiment, named entities and
/// question/answer pairs using Gemini or a local Ollama model.
///
/// Examples:
///   textlens --input article.txt
///   cat notes.txt | textlens --tasks summary,key-points --language German
///   textlens --text "Alice works at Acme." --tasks entities --format json
///   textlens --input report.txt --mode combined --provider ollama
///   textlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// File containing the text to analyze
    ///
    /// Reads from stdin when neither --input nor --text is given.
    #[arg(short, long, value_name = "FILE", conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Text to analyze, given inline
    #[arg(short, long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Output file path for the report (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .textlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    // === Backend ===

    /// Generation backend provider
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<Provider>,

    /// Model to use for generation
    ///
    /// Defaults to gemini-1.5-flash for Gemini and llama3.2:latest for Ollama.
    #[arg(short, long, env = "TEXTLENS_MODEL")]
    pub model: Option<String>,

    /// Backend API base URL
    #[arg(long, value_name = "URL", env = "TEXTLENS_BASE_URL")]
    pub base_url: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Nucleus sampling probability (0.0 - 1.0)
    #[arg(long)]
    pub top_p: Option<f64>,

    /// Top-k sampling cutoff
    #[arg(long)]
    pub top_k: Option<u32>,

    /// Maximum tokens per reply
    #[arg(long, value_name = "TOKENS")]
    pub max_output_tokens: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    // === Orchestration ===

    /// Request mode: one call per task, or one combined call
    #[arg(long, value_name = "MODE")]
    pub mode: Option<RunMode>,

    /// What to do after a failed task in per-task mode
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<FailurePolicy>,

    // === Analysis ===

    /// Tasks to run (comma-separated)
    ///
    /// Values: summary, key-points, sentiment, entities, qa
    #[arg(long, value_name = "TASKS", value_delimiter = ',')]
    pub tasks: Option<Vec<TaskKind>>,

    /// Language of the generated analysis
    #[arg(short, long, value_name = "LANGUAGE")]
    pub language: Option<String>,

    /// Number of sentences in the summary
    #[arg(long, value_name = "COUNT")]
    pub sentences: Option<usize>,

    /// Number of key points
    #[arg(long, value_name = "COUNT")]
    pub key_points: Option<usize>,

    /// Number of question/answer pairs
    #[arg(long, value_name = "COUNT")]
    pub questions: Option<usize>,

    /// Topics to focus on (comma-separated)
    #[arg(long, value_name = "KEYWORDS", value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Topics to avoid (comma-separated)
    #[arg(long, value_name = "KEYWORDS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Emphasize technical details
    #[arg(long)]
    pub technical: bool,

    /// Ask for a neutral, objective tone
    #[arg(long)]
    pub neutral_tone: bool,

    /// Generate a default .textlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate base URL format
        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate sampling ranges
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err("Top-p must be between 0.0 and 1.0".to_string());
            }
        }
        if self.max_output_tokens == Some(0) {
            return Err("Max output tokens must be at least 1".to_string());
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Validate counts
        for (name, value) in [
            ("Sentence count", self.sentences),
            ("Key point count", self.key_points),
            ("Question count", self.questions),
        ] {
            if value == Some(0) {
                return Err(format!("{} must be at least 1", name));
            }
        }

        if let Some(ref tasks) = self.tasks {
            if tasks.is_empty() {
                return Err("At least one task must be given with --tasks".to_string());
            }
        }

        // Validate input file if provided
        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
