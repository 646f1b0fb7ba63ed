//! Per-task reply decoding.
//!
//! Sentiment, entity and Q&A replies are JSON records; summary and key
//! point replies are plain text. Malformed or mis-shaped replies decode
//! to the task's fallback value instead of an error.

use super::{bullet_items, Decoded};
use crate::models::{Entity, QaPair, Sentiment, SentimentLabel, TaskKind, TaskOutput};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// JSON shape of a sentiment reply.
#[derive(Debug, Deserialize)]
struct SentimentRecord {
    #[serde(alias = "label")]
    sentiment: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, alias = "reason", alias = "explanation")]
    justification: String,
}

/// JSON shape of one entity.
#[derive(Debug, Deserialize)]
struct EntityRecord {
    #[serde(alias = "name")]
    text: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// JSON shape of one question/answer pair.
#[derive(Debug, Deserialize)]
struct QaRecord {
    #[serde(alias = "q")]
    question: String,
    #[serde(alias = "a")]
    answer: String,
}

/// Decode a per-task reply into that task's output.
pub fn decode_task(task: TaskKind, raw: &str) -> Decoded<TaskOutput> {
    match task {
        TaskKind::Summary => decode_summary(raw).map(TaskOutput::Summary),
        TaskKind::KeyPoints => decode_key_points(raw).map(TaskOutput::KeyPoints),
        TaskKind::Sentiment => decode_sentiment(raw).map(TaskOutput::Sentiment),
        TaskKind::Entities => decode_entities(raw).map(TaskOutput::Entities),
        TaskKind::Qa => decode_qa(raw).map(TaskOutput::Qa),
    }
}

pub fn decode_summary(raw: &str) -> Decoded<String> {
    let summary = raw.trim().to_string();
    if summary.is_empty() {
        Decoded::fallback(summary, "empty summary")
    } else {
        Decoded::Ok(summary)
    }
}

pub fn decode_key_points(raw: &str) -> Decoded<Vec<String>> {
    let points = bullet_items(raw.lines());
    if points.is_empty() {
        Decoded::fallback(points, "no bullet lines in key points reply")
    } else {
        Decoded::Ok(points)
    }
}

pub fn decode_sentiment(raw: &str) -> Decoded<Sentiment> {
    let record: SentimentRecord = match parse_record(raw) {
        Ok(record) => record,
        Err(reason) => return Decoded::fallback(Sentiment::undetermined(), reason),
    };

    let label = match record.sentiment.parse::<SentimentLabel>() {
        Ok(label) => label,
        Err(reason) => return Decoded::fallback(Sentiment::undetermined(), reason),
    };

    // Out-of-range scores are clamped; NaN and infinities are dropped.
    let score = record
        .score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0));

    Decoded::Ok(Sentiment {
        label,
        score,
        justification: record.justification.trim().to_string(),
    })
}

pub fn decode_entities(raw: &str) -> Decoded<Vec<Entity>> {
    match parse_record::<Vec<EntityRecord>>(raw) {
        Ok(records) => Decoded::Ok(
            records
                .into_iter()
                .filter(|r| !r.text.trim().is_empty())
                .map(|r| Entity {
                    kind: normalize_kind(&r.kind),
                    name: r.text.trim().to_string(),
                })
                .collect(),
        ),
        Err(reason) => Decoded::fallback(Vec::new(), reason),
    }
}

pub fn decode_qa(raw: &str) -> Decoded<Vec<QaPair>> {
    match parse_record::<Vec<QaRecord>>(raw) {
        Ok(records) => Decoded::Ok(
            records
                .into_iter()
                .map(|r| QaPair {
                    question: r.question.trim().to_string(),
                    answer: r.answer.trim().to_string(),
                })
                .filter(|p| !p.question.is_empty() && !p.answer.is_empty())
                .collect(),
        ),
        Err(reason) => Decoded::fallback(Vec::new(), reason),
    }
}

fn normalize_kind(kind: &str) -> String {
    let kind = kind.trim().to_lowercase();
    if kind.is_empty() {
        "other".to_string()
    } else {
        kind
    }
}

/// Parse the first JSON value in a reply that has the shape of `T`.
///
/// Models often wrap JSON in Markdown fences or add sentences around it,
/// sometimes with brackets of their own. Each `{` or `[` is tried as the
/// start of a value; text after a complete value is ignored.
fn parse_record<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let mut first_error = None;

    for (start, _) in raw.match_indices(['{', '[']) {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    Err(match first_error {
        Some(e) => format!("reply does not match expected shape: {}", e),
        None => "reply contains no JSON value".to_string(),
    })
}
