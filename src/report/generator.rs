//! Markdown report generation.
//!
//! This module generates Markdown and JSON reports from a finished
//! analysis run.

use crate::models::{
    AnalysisResult, Entity, QaPair, Report, ReportMetadata, Sentiment, TaskKind, TaskState,
};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# TextLens Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    // Task status table
    output.push_str(&generate_status_section(report));

    // One section per requested task, in dispatch order
    for task in report.tasks.keys() {
        output.push_str(&generate_task_section(*task, &report.result, report));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Input Length:** {} characters\n",
        metadata.input_chars
    ));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Backend:** `{}`\n", metadata.backend));
    section.push_str(&format!("- **Mode:** {}\n", metadata.mode));
    section.push_str(&format!("- **Language:** {}\n", metadata.output_language));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the task status table.
fn generate_status_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("## Tasks\n\n");
    section.push_str("| Task | Status |\n");
    section.push_str("|:---|:---:|\n");

    for (task, state) in &report.tasks {
        let badge = match state {
            TaskState::Succeeded if report.degraded.contains(task) => "⚠️ fallback",
            TaskState::Succeeded => "✅ succeeded",
            TaskState::Failed => "❌ failed",
            TaskState::Running => "⏳ running",
            TaskState::Pending => "⏸️ not run",
        };
        section.push_str(&format!("| {} | {} |\n", task, badge));
    }
    section.push('\n');

    if !report.failures.is_empty() {
        for (task, message) in &report.failures {
            section.push_str(&format!("> **{} failed:** {}\n", task, message));
        }
        section.push('\n');
    }

    section
}

/// Generate the section for one task.
fn generate_task_section(task: TaskKind, result: &AnalysisResult, report: &Report) -> String {
    let mut section = format!("## {}\n\n", task);

    let body = match task {
        TaskKind::Summary => result.summary.as_deref().map(|s| format!("{}\n\n", s.trim())),
        TaskKind::KeyPoints => result.key_points.as_deref().map(generate_key_points),
        TaskKind::Sentiment => result.sentiment.as_ref().map(generate_sentiment),
        TaskKind::Entities => result.entities.as_deref().map(generate_entities),
        TaskKind::Qa => result.qa.as_deref().map(generate_qa),
    };

    match body {
        Some(body) => {
            if report.degraded.contains(&task) {
                section.push_str("*The reply could not be decoded; showing a fallback value.*\n\n");
            }
            section.push_str(&body);
        }
        None => section.push_str(&missing_note(report.tasks.get(&task))),
    }

    section
}

fn missing_note(state: Option<&TaskState>) -> String {
    match state {
        Some(TaskState::Failed) => "*This task failed.*\n\n".to_string(),
        _ => "*This task did not run.*\n\n".to_string(),
    }
}

fn generate_key_points(points: &[String]) -> String {
    if points.is_empty() {
        return "No key points were found.\n\n".to_string();
    }

    let mut block = String::new();
    for point in points {
        block.push_str(&format!("- {}\n", point));
    }
    block.push('\n');
    block
}

fn generate_sentiment(sentiment: &Sentiment) -> String {
    let mut block = format!("{} **{}**", sentiment.label.emoji(), sentiment.label);
    if let Some(score) = sentiment.score {
        block.push_str(&format!(" (score: {:.2})", score));
    }
    block.push_str("\n\n");

    if !sentiment.justification.is_empty() {
        block.push_str(&format!("> {}\n\n", sentiment.justification));
    }

    block
}

fn generate_entities(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return "No named entities were found.\n\n".to_string();
    }

    // Group by type, keeping first-seen order within a type
    let mut by_kind: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entity in entities {
        by_kind
            .entry(entity.kind.as_str())
            .or_default()
            .push(entity.name.as_str());
    }

    let mut block = String::new();
    block.push_str("| Type | Entities |\n");
    block.push_str("|:---|:---|\n");
    for (kind, names) in by_kind {
        block.push_str(&format!("| {} | {} |\n", kind, names.join(", ")));
    }
    block.push('\n');
    block
}

fn generate_qa(pairs: &[QaPair]) -> String {
    if pairs.is_empty() {
        return "No questions were generated.\n\n".to_string();
    }

    let mut block = String::new();
    for (i, pair) in pairs.iter().enumerate() {
        block.push_str(&format!("**Q{}. {}**\n\n", i + 1, pair.question));
        block.push_str(&format!("{}\n\n", pair.answer));
    }
    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by TextLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentLabel;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn create_test_metadata() -> ReportMetadata {
        ReportMetadata {
            source: "article.txt".to_string(),
            input_chars: 512,
            analysis_date: Utc::now(),
            backend: "gemini (gemini-1.5-flash)".to_string(),
            mode: "per-task".to_string(),
            output_language: "English".to_string(),
            duration_seconds: 4.2,
        }
    }

    fn create_test_report() -> Report {
        let result = AnalysisResult {
            summary: Some("Alice joined Acme in 2020.".to_string()),
            key_points: Some(vec!["Alice joined Acme".to_string(), "It was 2020".to_string()]),
            sentiment: Some(Sentiment {
                label: SentimentLabel::Positive,
                score: Some(0.8),
                justification: "Upbeat wording".to_string(),
            }),
            entities: Some(vec![
                Entity {
                    kind: "person".to_string(),
                    name: "Alice".to_string(),
                },
                Entity {
                    kind: "organization".to_string(),
                    name: "Acme".to_string(),
                },
                Entity {
                    kind: "person".to_string(),
                    name: "Bob".to_string(),
                },
            ]),
            qa: Some(vec![QaPair {
                question: "Who joined Acme?".to_string(),
                answer: "Alice".to_string(),
            }]),
        };

        Report {
            metadata: create_test_metadata(),
            result,
            tasks: TaskKind::ALL
                .iter()
                .map(|t| (*t, TaskState::Succeeded))
                .collect(),
            degraded: BTreeSet::new(),
            failures: BTreeMap::new(),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# TextLens Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("Alice joined Acme in 2020."));
        assert!(markdown.contains("- It was 2020"));
        assert!(markdown.contains("🟢 **Positive** (score: 0.80)"));
        assert!(markdown.contains("| person | Alice, Bob |"));
        assert!(markdown.contains("**Q1. Who joined Acme?**"));

        let summary_at = markdown.find("## Summary").unwrap();
        let qa_at = markdown.find("## Q&A").unwrap();
        assert!(summary_at < qa_at);
    }

    #[test]
    fn test_generate_metadata_section() {
        let section = generate_metadata_section(&create_test_metadata());

        assert!(section.contains("article.txt"));
        assert!(section.contains("512 characters"));
        assert!(section.contains("`gemini (gemini-1.5-flash)`"));
        assert!(section.contains("4.2s"));
    }

    #[test]
    fn test_failed_and_degraded_tasks() {
        let mut report = create_test_report();
        report.result.qa = None;
        report.tasks.insert(TaskKind::Qa, TaskState::Failed);
        report.tasks.insert(TaskKind::Entities, TaskState::Pending);
        report.result.entities = None;
        report.degraded.insert(TaskKind::Sentiment);
        report
            .failures
            .insert(TaskKind::Qa, "HTTP 503".to_string());

        assert!(!report.is_complete());

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("| Q&A | ❌ failed |"));
        assert!(markdown.contains("| Sentiment | ⚠️ fallback |"));
        assert!(markdown.contains("> **Q&A failed:** HTTP 503"));
        assert!(markdown.contains("*This task failed.*"));
        assert!(markdown.contains("*This task did not run.*"));
        assert!(markdown.contains("showing a fallback value"));
    }

    #[test]
    fn test_only_requested_tasks_rendered() {
        let mut report = create_test_report();
        report.tasks = [(TaskKind::Summary, TaskState::Succeeded)].into_iter().collect();

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("## Summary"));
        assert!(!markdown.contains("## Key Points"));
        assert!(!markdown.contains("## Sentiment"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["result"]["summary"], "Alice joined Acme in 2020.");
        assert_eq!(value["result"]["entities"][1]["type"], "organization");
        assert_eq!(value["result"]["sentiment"]["label"], "positive");
        assert_eq!(value["tasks"]["key-points"], "succeeded");
        assert!(value.get("failures").is_none());
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        write_report("# hello\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");
    }
}
