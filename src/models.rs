//! Data models for text analysis.
//!
//! This module contains the configuration of an analysis run, the task
//! lifecycle types, and the result aggregate that tasks fill in.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One of the fixed analysis kinds.
///
/// Declaration order is the order tasks are dispatched in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Summary,
    KeyPoints,
    Sentiment,
    Entities,
    Qa,
}

impl TaskKind {
    /// All task kinds in dispatch order.
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Summary,
        TaskKind::KeyPoints,
        TaskKind::Sentiment,
        TaskKind::Entities,
        TaskKind::Qa,
    ];

    /// Whether per-task replies for this kind are JSON records.
    pub fn expects_json(&self) -> bool {
        matches!(
            self,
            TaskKind::Sentiment | TaskKind::Entities | TaskKind::Qa
        )
    }

    /// Section label used in combined-mode documents.
    pub fn section_label(&self) -> &'static str {
        match self {
            TaskKind::Summary => "Summary:",
            TaskKind::KeyPoints => "Key Points:",
            TaskKind::Sentiment => "Sentiment Analysis:",
            TaskKind::Entities => "Key Entities:",
            TaskKind::Qa => "Questions & Answers:",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Summary => write!(f, "Summary"),
            TaskKind::KeyPoints => write!(f, "Key Points"),
            TaskKind::Sentiment => write!(f, "Sentiment"),
            TaskKind::Entities => write!(f, "Entities"),
            TaskKind::Qa => write!(f, "Q&A"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "summary" => Ok(TaskKind::Summary),
            "key-points" | "keypoints" => Ok(TaskKind::KeyPoints),
            "sentiment" => Ok(TaskKind::Sentiment),
            "entities" => Ok(TaskKind::Entities),
            "qa" | "q&a" => Ok(TaskKind::Qa),
            other => Err(format!("Unknown task: {}", other)),
        }
    }
}

/// Lifecycle state of a single task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Returns true once the task can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    /// Legal moves: Pending -> Running -> Succeeded | Failed.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Running)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Running => write!(f, "running"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Which analyses run and how they are phrased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Language the generated analysis must be written in.
    #[serde(default = "default_language")]
    pub output_language: String,

    /// Exact number of sentences in the summary.
    #[serde(default = "default_summary_sentences")]
    pub summary_sentences: usize,

    /// Exact number of key points.
    #[serde(default = "default_key_point_count")]
    pub key_point_count: usize,

    /// Number of question/answer pairs to request.
    #[serde(default = "default_qa_pair_count")]
    pub qa_pair_count: usize,

    /// Topics the analysis should focus on.
    #[serde(default)]
    pub include_keywords: Vec<String>,

    /// Topics the analysis should stay away from.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    /// Emphasize technical detail and terminology.
    #[serde(default)]
    pub technical_focus: bool,

    /// Ask for an objective, neutral tone.
    #[serde(default)]
    pub neutral_tone: bool,

    /// Tasks to run. Iteration order is the fixed dispatch order.
    #[serde(default = "default_enabled_tasks")]
    pub enabled_tasks: BTreeSet<TaskKind>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_language: default_language(),
            summary_sentences: default_summary_sentences(),
            key_point_count: default_key_point_count(),
            qa_pair_count: default_qa_pair_count(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            technical_focus: false,
            neutral_tone: false,
            enabled_tasks: default_enabled_tasks(),
        }
    }
}

fn default_language() -> String {
    "English".to_string()
}

fn default_summary_sentences() -> usize {
    3
}

fn default_key_point_count() -> usize {
    5
}

fn default_qa_pair_count() -> usize {
    5
}

fn default_enabled_tasks() -> BTreeSet<TaskKind> {
    TaskKind::ALL.into_iter().collect()
}

impl AnalysisConfig {
    /// Config that runs exactly the given tasks, defaults otherwise.
    #[allow(dead_code)]
    pub fn with_tasks<I: IntoIterator<Item = TaskKind>>(tasks: I) -> Self {
        Self {
            enabled_tasks: tasks.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Trim keywords and drop blank ones.
    pub fn normalize_keywords(&mut self) {
        fn clean(list: &mut Vec<String>) {
            for keyword in list.iter_mut() {
                *keyword = keyword.trim().to_string();
            }
            list.retain(|k| !k.is_empty());
        }
        clean(&mut self.include_keywords);
        clean(&mut self.exclude_keywords);
    }

    /// Check the invariants that do not depend on the input text.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.enabled_tasks.is_empty() {
            return Err(AnalysisError::NoTasksEnabled);
        }
        if self.output_language.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "output language must not be empty".to_string(),
            ));
        }
        if self.summary_sentences == 0 {
            return Err(AnalysisError::InvalidConfig(
                "summary sentence count must be at least 1".to_string(),
            ));
        }
        if self.key_point_count == 0 {
            return Err(AnalysisError::InvalidConfig(
                "key point count must be at least 1".to_string(),
            ));
        }
        if self.qa_pair_count == 0 {
            return Err(AnalysisError::InvalidConfig(
                "Q&A pair count must be at least 1".to_string(),
            ));
        }
        let blank = self
            .include_keywords
            .iter()
            .chain(&self.exclude_keywords)
            .any(|k| k.trim().is_empty());
        if blank {
            return Err(AnalysisError::InvalidConfig(
                "keyword lists must not contain empty strings".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overall sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "Positive"),
            SentimentLabel::Negative => write!(f, "Negative"),
            SentimentLabel::Neutral => write!(f, "Neutral"),
            SentimentLabel::Mixed => write!(f, "Mixed"),
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    /// Case-insensitive; ignores surrounding Markdown emphasis.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s
            .trim()
            .trim_matches(|c: char| c == '*' || c == '_' || c == '"' || c.is_whitespace())
            .to_lowercase();
        match cleaned.as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "mixed" => Ok(SentimentLabel::Mixed),
            other => Err(format!("Unknown sentiment label: {}", other)),
        }
    }
}

impl SentimentLabel {
    /// Returns an emoji representation of the label.
    pub fn emoji(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "🟢",
            SentimentLabel::Negative => "🔴",
            SentimentLabel::Neutral => "⚪",
            SentimentLabel::Mixed => "🟡",
        }
    }
}

/// Sentiment of the analysed text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Confidence in [0, 1], when the backend provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub justification: String,
}

impl Sentiment {
    /// Value used when a sentiment record cannot be decoded.
    pub fn undetermined() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: Some(0.5),
            justification: "could not be determined".to_string(),
        }
    }
}

/// A named entity mentioned in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// A generated question with its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Decoded output of a single task, ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Summary(String),
    KeyPoints(Vec<String>),
    Sentiment(Sentiment),
    Entities(Vec<Entity>),
    Qa(Vec<QaPair>),
}

impl TaskOutput {
    /// The task that owns this output.
    pub fn task(&self) -> TaskKind {
        match self {
            TaskOutput::Summary(_) => TaskKind::Summary,
            TaskOutput::KeyPoints(_) => TaskKind::KeyPoints,
            TaskOutput::Sentiment(_) => TaskKind::Sentiment,
            TaskOutput::Entities(_) => TaskKind::Entities,
            TaskOutput::Qa(_) => TaskKind::Qa,
        }
    }
}

/// Aggregate result of one analysis run.
///
/// Fields start out `None` and are filled at most once, by the task
/// that owns them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa: Option<Vec<QaPair>>,
}

impl AnalysisResult {
    /// Whether the field owned by `task` has been filled.
    pub fn has(&self, task: TaskKind) -> bool {
        match task {
            TaskKind::Summary => self.summary.is_some(),
            TaskKind::KeyPoints => self.key_points.is_some(),
            TaskKind::Sentiment => self.sentiment.is_some(),
            TaskKind::Entities => self.entities.is_some(),
            TaskKind::Qa => self.qa.is_some(),
        }
    }

    /// Store a task's output. Returns false, leaving the field
    /// untouched, if it was already filled.
    pub fn merge(&mut self, output: TaskOutput) -> bool {
        if self.has(output.task()) {
            return false;
        }
        match output {
            TaskOutput::Summary(s) => self.summary = Some(s),
            TaskOutput::KeyPoints(points) => self.key_points = Some(points),
            TaskOutput::Sentiment(s) => self.sentiment = Some(s),
            TaskOutput::Entities(e) => self.entities = Some(e),
            TaskOutput::Qa(pairs) => self.qa = Some(pairs),
        }
        true
    }

    /// Returns true when no field has been filled.
    pub fn is_empty(&self) -> bool {
        TaskKind::ALL.iter().all(|t| !self.has(*t))
    }
}

/// Metadata about an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the text came from: a file path, `stdin` or `inline`.
    pub source: String,
    /// Character count of the analysed text.
    pub input_chars: usize,
    pub analysis_date: DateTime<Utc>,
    /// Backend description, e.g. `gemini (gemini-1.5-flash)`.
    pub backend: String,
    pub mode: String,
    pub output_language: String,
    pub duration_seconds: f64,
}

/// Complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub result: AnalysisResult,
    /// Final state of every requested task, in dispatch order.
    pub tasks: BTreeMap<TaskKind, TaskState>,
    /// Tasks whose reply could not be decoded and hold a fallback value.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub degraded: BTreeSet<TaskKind>,
    /// Backend error messages for failed tasks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<TaskKind, String>,
}

impl Report {
    /// Returns true if every requested task succeeded.
    pub fn is_complete(&self) -> bool {
        self.tasks.values().all(|s| *s == TaskState::Succeeded)
    }
}
