//! Instruction construction for each analysis task.
//!
//! Every function here is pure: the same task, configuration and text
//! always produce the same instruction string.

use crate::models::{AnalysisConfig, TaskKind};

/// Marker that opens the analysed text inside an instruction.
pub const TEXT_START: &str = "--- TEXT START ---";
/// Marker that closes the analysed text inside an instruction.
pub const TEXT_END: &str = "--- TEXT END ---";

const SENTIMENT_SCHEMA: &str = r#"{"sentiment": "positive" | "negative" | "neutral" | "mixed", "score": <number between 0.0 and 1.0>, "justification": "<one sentence>"}"#;

const ENTITIES_SCHEMA: &str = r#"[{"text": "<entity as written in the text>", "type": "person" | "organization" | "location" | "date" | "product" | "event" | "other"}]"#;

const QA_SCHEMA: &str = r#"[{"question": "<question about the text>", "answer": "<answer grounded in the text>"}]"#;

const JSON_ONLY: &str = "Respond with valid JSON only, exactly matching this schema. Do not wrap it in Markdown and do not add any other text. Keep the JSON keys in English.";

/// Build the instruction for a single task in per-task mode.
pub fn build(task: TaskKind, config: &AnalysisConfig, text: &str) -> String {
    let mut prompt = String::new();

    match task {
        TaskKind::Summary => {
            prompt.push_str(&format!(
                "Summarize the following text in exactly {}.\n",
                sentences(config.summary_sentences)
            ));
            prompt.push_str("Respond with the summary only, as plain prose.\n");
        }
        TaskKind::KeyPoints => {
            prompt.push_str(&format!(
                "Extract exactly {} from the following text.\n",
                items(config.key_point_count, "key point", "key points")
            ));
            prompt.push_str(
                "Write each key point on its own line, starting with \"- \". Output nothing else.\n",
            );
        }
        TaskKind::Sentiment => {
            prompt.push_str(
                "Analyze the overall sentiment of the following text. Use \"mixed\" when positive and negative sentiment are both significant.\n",
            );
            prompt.push_str(JSON_ONLY);
            prompt.push('\n');
            prompt.push_str(&format!("Schema: {}\n", SENTIMENT_SCHEMA));
        }
        TaskKind::Entities => {
            prompt.push_str(
                "Identify the key named entities (people, organizations, locations, dates, products, events) in the following text.\n",
            );
            prompt.push_str(JSON_ONLY);
            prompt.push('\n');
            prompt.push_str(&format!("Schema: {}\n", ENTITIES_SCHEMA));
            prompt.push_str("Return an empty array if there are no entities.\n");
        }
        TaskKind::Qa => {
            prompt.push_str(&format!(
                "Write exactly {} that a reader could answer from the following text, each with its answer.\n",
                items(config.qa_pair_count, "question", "questions")
            ));
            prompt.push_str(JSON_ONLY);
            prompt.push('\n');
            prompt.push_str(&format!("Schema: {}\n", QA_SCHEMA));
        }
    }

    push_directives(&mut prompt, config, task.expects_json());
    push_text(&mut prompt, text);
    prompt
}

/// Build the single instruction used in combined mode.
///
/// Sections are requested for every enabled task, in dispatch order,
/// each introduced by its fixed label.
pub fn build_combined(config: &AnalysisConfig, text: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("Analyze the following text and respond with a document made of these sections, in this order. Start each section with its label on its own line, exactly as written, and do not add any other sections or commentary.\n\n");

    for task in &config.enabled_tasks {
        prompt.push_str(task.section_label());
        prompt.push('\n');
        prompt.push_str(&combined_section_format(*task, config));
        prompt.push_str("\n\n");
    }

    push_directives(&mut prompt, config, false);
    push_text(&mut prompt, text);
    prompt
}

fn combined_section_format(task: TaskKind, config: &AnalysisConfig) -> String {
    match task {
        TaskKind::Summary => format!(
            "A summary in exactly {}.",
            sentences(config.summary_sentences)
        ),
        TaskKind::KeyPoints => format!(
            "Exactly {}, one per line, each starting with \"- \".",
            items(config.key_point_count, "key point", "key points")
        ),
        TaskKind::Sentiment => "One line in the form \"<label>: <justification>\", where <label> is one of Positive, Negative, Neutral or Mixed.".to_string(),
        TaskKind::Entities => "One entity per line in the form \"- <type>: <name>\", where <type> is one of person, organization, location, date, product, event or other.".to_string(),
        TaskKind::Qa => format!(
            "Exactly {}. Put each question on a line starting with \"Q: \" and its answer on the next line starting with \"A: \".",
            items(config.qa_pair_count, "question", "questions")
        ),
    }
}

/// Language, keyword and tone directives shared by every instruction.
fn push_directives(prompt: &mut String, config: &AnalysisConfig, json: bool) {
    prompt.push('\n');

    if json {
        prompt.push_str(&format!(
            "Write all string values in {}.\n",
            config.output_language
        ));
    } else {
        prompt.push_str(&format!(
            "Write your entire response in {}.\n",
            config.output_language
        ));
    }

    if !config.include_keywords.is_empty() {
        prompt.push_str(&format!(
            "Focus especially on these topics: {}.\n",
            quoted_list(&config.include_keywords)
        ));
    }

    if !config.exclude_keywords.is_empty() {
        prompt.push_str(&format!(
            "Avoid discussing these topics: {}.\n",
            quoted_list(&config.exclude_keywords)
        ));
    }

    if config.technical_focus {
        prompt.push_str("Emphasize technical details, terminology and specifics.\n");
    }

    if config.neutral_tone {
        prompt.push_str("Use a neutral, objective tone.\n");
    }
}

fn push_text(prompt: &mut String, text: &str) {
    prompt.push('\n');
    prompt.push_str(TEXT_START);
    prompt.push('\n');
    prompt.push_str(text);
    prompt.push('\n');
    prompt.push_str(TEXT_END);
}

fn quoted_list(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| format!("\"{}\"", k))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sentences(count: usize) -> String {
    items(count, "sentence", "sentences")
}

fn items(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}
