//! TextLens - LLM-powered text analysis
//!
//! A CLI tool that sends text to Gemini or Ollama and produces a report
//! with a summary, key points, sentiment, named entities and Q&A pairs.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Validation, config or I/O error
//!   2 - A backend call failed (partial results are still written)

mod backend;
mod cli;
mod config;
mod decode;
mod error;
mod input;
mod models;
mod orchestrator;
mod progress;
mod prompt;
mod report;

use anyhow::{Context, Result};
use backend::{Backend, GenerationBackend, GenerationOptions};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use futures::StreamExt;
use input::InputSource;
use error::AnalysisError;
use models::{Report, ReportMetadata, TaskState};
use orchestrator::{Orchestrator, RunEvent};
use progress::ProgressDisplay;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `verbose` in the file applies
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, &config);

    info!("TextLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the analysis
    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            if e
                .downcast_ref::<AnalysisError>()
                .is_some_and(|e| e.is_validation())
            {
                error!("Nothing was sent to the backend: {}", e);
            }
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .textlens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the backend, tasks, language, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args);

    // Step 1: Read the input
    let source = InputSource::from_args(&args);
    if source == InputSource::Stdin {
        info!("Reading text from stdin");
    }
    let text = source.read()?;

    // Step 2: Build the backend
    let backend = Backend::from_config(&config.backend)?;
    let orchestrator = Orchestrator::new(
        config.general.mode,
        config.general.policy,
        GenerationOptions::from(&config.backend),
    );

    if !args.quiet {
        eprintln!("🔬 Analyzing {} characters", text.chars().count());
        eprintln!("   Backend: {}", backend.describe());
        eprintln!("   Mode: {} ({})", orchestrator.mode(), config.general.policy);
        eprintln!("   Timeout: {}s\n", config.backend.timeout_seconds);
    }

    // Step 3: Run the tasks, rendering progress as updates arrive
    let events = orchestrator.run(&text, &config.analysis, &backend)?;
    let mut events = std::pin::pin!(events);
    let mut display = ProgressDisplay::new(!args.quiet);
    let mut outcome = None;

    while let Some(event) = events.next().await {
        match event {
            RunEvent::Progress(update) => display.update(&update),
            RunEvent::Finished(finished) => outcome = Some(finished),
        }
    }
    display.finish_all();

    let outcome = outcome.context("Analysis ended without a final outcome")?;

    // Step 4: Build the report
    let metadata = ReportMetadata {
        source: source.label(),
        input_chars: text.chars().count(),
        analysis_date: Utc::now(),
        backend: backend.describe(),
        mode: orchestrator.mode().to_string(),
        output_language: config.analysis.output_language.clone(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        result: outcome.result.clone(),
        tasks: outcome.states.clone(),
        degraded: outcome.degraded.clone(),
        failures: outcome
            .failures
            .iter()
            .map(|(task, e)| (*task, e.message.clone()))
            .collect(),
    };

    // Step 5: Render and write the report
    let rendered = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            report::write_report(&rendered, path)?;
            if !args.quiet {
                eprintln!("\n✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }

    if !args.quiet {
        let failed = outcome.tasks_in(TaskState::Failed);
        eprintln!("\n📊 Analysis Summary:");
        eprintln!(
            "   Tasks: {} succeeded, {} failed, {} not run",
            outcome.tasks_in(TaskState::Succeeded).len(),
            failed.len(),
            outcome.tasks_in(TaskState::Pending).len()
        );
        if !failed.is_empty() {
            let names: Vec<String> = failed.iter().map(|t| t.to_string()).collect();
            eprintln!("   Failed: {}", names.join(", "));
        }
        eprintln!("   Duration: {:.1}s", report.metadata.duration_seconds);
    }

    if outcome.result.is_empty() && !report.is_complete() {
        warn!("No analysis results were produced");
    }

    if !outcome.degraded.is_empty() {
        warn!(
            "{} task(s) used fallback values: {:?}",
            outcome.degraded.len(),
            outcome.degraded
        );
    }

    // Step 6: Exit code
    if outcome.is_success() {
        info!(
            "Analysis complete in {:.1}s",
            start_time.elapsed().as_secs_f64()
        );
        return Ok(0);
    }

    if let Some(ref e) = outcome.error {
        error!("{}", e);
        if !args.quiet {
            eprintln!("\n⛔ {} (exit code 2)", e);
        }
    }
    Ok(2)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    Ok(Config::load_default()?.unwrap_or_default())
}
