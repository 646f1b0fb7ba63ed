//! Delimited-section decoding for combined-mode replies.
//!
//! A combined reply is one document whose sections are introduced by
//! fixed labels (`Summary:`, `Key Points:`, ...). The decoder is a small
//! line-oriented state machine: label lines switch the current section,
//! every other line is accumulated into the section that is open.

use super::{bullet_items, Decoded, BULLET};
use crate::models::{AnalysisResult, Entity, QaPair, Sentiment, SentimentLabel, TaskKind, TaskOutput};
use std::collections::BTreeMap;

/// Entity type used when a bullet carries no `type:` prefix.
const UNTYPED_ENTITY: &str = "other";

/// All five fields of a combined reply, each tagged with how it decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSections {
    pub summary: Decoded<String>,
    pub key_points: Decoded<Vec<String>>,
    pub sentiment: Decoded<Sentiment>,
    pub entities: Decoded<Vec<Entity>>,
    pub qa: Decoded<Vec<QaPair>>,
}

impl CombinedSections {
    /// The decoded output for one task.
    pub fn output(&self, task: TaskKind) -> Decoded<TaskOutput> {
        match task {
            TaskKind::Summary => self.summary.clone().map(TaskOutput::Summary),
            TaskKind::KeyPoints => self.key_points.clone().map(TaskOutput::KeyPoints),
            TaskKind::Sentiment => self.sentiment.clone().map(TaskOutput::Sentiment),
            TaskKind::Entities => self.entities.clone().map(TaskOutput::Entities),
            TaskKind::Qa => self.qa.clone().map(TaskOutput::Qa),
        }
    }

    /// Tasks whose section fell back to a default.
    #[allow(dead_code)]
    pub fn degraded(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|t| self.output(*t).is_degraded())
            .collect()
    }

    /// A result with every field filled, defaults included.
    #[allow(dead_code)] // Convenience for callers that take every section
    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult {
            summary: Some(self.summary.into_value()),
            key_points: Some(self.key_points.into_value()),
            sentiment: Some(self.sentiment.into_value()),
            entities: Some(self.entities.into_value()),
            qa: Some(self.qa.into_value()),
        }
    }
}

/// Decode a combined-mode document. Never fails; missing or unreadable
/// sections fall back to empty values and a neutral sentiment.
pub fn decode_combined(raw: &str) -> CombinedSections {
    let blocks = split_sections(raw);
    let block = |task: TaskKind| blocks.get(&task).map(Vec::as_slice);

    CombinedSections {
        summary: decode_summary_block(block(TaskKind::Summary)),
        key_points: decode_key_points_block(block(TaskKind::KeyPoints)),
        sentiment: decode_sentiment_block(block(TaskKind::Sentiment)),
        entities: decode_entities_block(block(TaskKind::Entities)),
        qa: decode_qa_block(block(TaskKind::Qa)),
    }
}

/// Split a document into the lines of each labelled section.
///
/// Text before the first label is ignored. Sections may come in any
/// order; the first occurrence of a label wins and a repeated label's
/// content is discarded.
fn split_sections(raw: &str) -> BTreeMap<TaskKind, Vec<&str>> {
    let mut blocks: BTreeMap<TaskKind, Vec<&str>> = BTreeMap::new();
    let mut current: Option<TaskKind> = None;

    for line in raw.lines() {
        if let Some((task, rest)) = match_label(line) {
            if blocks.contains_key(&task) {
                current = None;
                continue;
            }
            let lines = blocks.entry(task).or_default();
            if !rest.is_empty() {
                lines.push(rest);
            }
            current = Some(task);
            continue;
        }

        if let Some(task) = current {
            if let Some(lines) = blocks.get_mut(&task) {
                lines.push(line);
            }
        }
    }

    blocks
}

/// Names a section may be introduced by, besides its canonical label.
fn label_aliases(task: TaskKind) -> &'static [&'static str] {
    match task {
        TaskKind::Summary => &[],
        TaskKind::KeyPoints => &["main points"],
        TaskKind::Sentiment => &["sentiment"],
        TaskKind::Entities => &["entities", "named entities"],
        TaskKind::Qa => &["questions and answers", "q&a", "q & a"],
    }
}

/// Recognize a section label line, returning the task and any content
/// that follows the label on the same line.
///
/// Matching is case-insensitive and tolerates Markdown heading and
/// emphasis markers, e.g. `## Summary:` or `**Key Points:**`, and a
/// parenthesised note before the colon, e.g. `Key Points (5):`.
fn match_label(line: &str) -> Option<(TaskKind, &str)> {
    let is_markup = |c: char| c == '#' || c == '*' || c.is_whitespace();
    let stripped = line.trim_start_matches(is_markup);

    for task in TaskKind::ALL {
        let canonical = task.section_label().trim_end_matches(':');
        let names = std::iter::once(canonical).chain(label_aliases(task).iter().copied());

        for name in names {
            let Some(head) = stripped.get(..name.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(name) {
                continue;
            }

            let mut after = stripped[name.len()..].trim_start_matches(is_markup);
            if let Some(note) = after.strip_prefix('(') {
                match note.split_once(')') {
                    Some((_, rest)) => after = rest.trim_start_matches(is_markup),
                    None => continue,
                }
            }

            if after.is_empty() {
                return Some((task, after));
            }
            if let Some(rest) = after.strip_prefix(':') {
                return Some((task, rest.trim_matches(is_markup)));
            }
        }
    }

    None
}

fn decode_summary_block(block: Option<&[&str]>) -> Decoded<String> {
    let Some(lines) = block else {
        return Decoded::fallback(String::new(), "summary section missing");
    };

    let summary = lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if summary.is_empty() {
        Decoded::fallback(summary, "summary section empty")
    } else {
        Decoded::Ok(summary)
    }
}

fn decode_key_points_block(block: Option<&[&str]>) -> Decoded<Vec<String>> {
    let Some(lines) = block else {
        return Decoded::fallback(Vec::new(), "key points section missing");
    };

    let points = bullet_items(lines.iter().copied());
    if points.is_empty() {
        Decoded::fallback(points, "key points section has no bullet lines")
    } else {
        Decoded::Ok(points)
    }
}

fn decode_sentiment_block(block: Option<&[&str]>) -> Decoded<Sentiment> {
    let Some(lines) = block else {
        return Decoded::fallback(Sentiment::default(), "sentiment section missing");
    };

    let content = lines
        .iter()
        .map(|l| {
            let l = l.trim();
            l.strip_prefix(BULLET).unwrap_or(l)
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if content.is_empty() {
        return Decoded::fallback(Sentiment::default(), "sentiment section empty");
    }

    parse_sentiment_line(&content)
}

/// Parse `label: justification`, split on the first colon.
pub(crate) fn parse_sentiment_line(content: &str) -> Decoded<Sentiment> {
    match content.split_once(':') {
        Some((label, justification)) => {
            let justification = justification
                .trim()
                .trim_start_matches('*')
                .trim()
                .to_string();
            match label.parse::<SentimentLabel>() {
                Ok(label) => Decoded::Ok(Sentiment {
                    label,
                    score: None,
                    justification,
                }),
                Err(e) => Decoded::fallback(
                    Sentiment {
                        label: SentimentLabel::Neutral,
                        score: None,
                        justification,
                    },
                    e,
                ),
            }
        }
        None => match content.parse::<SentimentLabel>() {
            Ok(label) => Decoded::Ok(Sentiment {
                label,
                score: None,
                justification: String::new(),
            }),
            Err(e) => Decoded::fallback(
                Sentiment {
                    label: SentimentLabel::Neutral,
                    score: None,
                    justification: content.trim().to_string(),
                },
                e,
            ),
        },
    }
}

fn decode_entities_block(block: Option<&[&str]>) -> Decoded<Vec<Entity>> {
    let Some(lines) = block else {
        return Decoded::fallback(Vec::new(), "entities section missing");
    };

    let entities: Vec<Entity> = bullet_items(lines.iter().copied())
        .into_iter()
        .filter_map(|item| parse_entity_item(&item))
        .collect();

    if entities.is_empty() {
        Decoded::fallback(entities, "entities section has no bullet lines")
    } else {
        Decoded::Ok(entities)
    }
}

/// `type: name`, or a bare name typed as "other".
fn parse_entity_item(item: &str) -> Option<Entity> {
    let (kind, name) = match item.split_once(':') {
        Some((kind, name)) => (kind.trim().trim_matches('*').trim(), name.trim()),
        None => (UNTYPED_ENTITY, item.trim()),
    };

    if name.is_empty() {
        return None;
    }

    let kind = if kind.is_empty() {
        UNTYPED_ENTITY.to_string()
    } else {
        kind.to_lowercase()
    };

    Some(Entity {
        kind,
        name: name.to_string(),
    })
}

/// Which half of a Q&A pair a marker line starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QaMarker {
    Question,
    Answer,
}

/// Recognize `Q:` / `A:` lines, allowing `Q1:`, `Question:`, bullets,
/// list numbers (`1. Q:`) and bold markup around the marker.
fn match_qa_marker(line: &str) -> Option<(QaMarker, &str)> {
    let line = line.trim();
    let line = line.strip_prefix(BULLET).unwrap_or(line);
    let line = strip_list_number(line);
    let line = line.trim_start_matches('*');

    let (marker, rest) = if let Some(rest) = strip_prefix_ignore_case(line, "question") {
        (QaMarker::Question, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(line, "answer") {
        (QaMarker::Answer, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(line, "q") {
        (QaMarker::Question, rest)
    } else if let Some(rest) = strip_prefix_ignore_case(line, "a") {
        (QaMarker::Answer, rest)
    } else {
        return None;
    };

    let rest = rest.trim_start().trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = rest.trim_start_matches('*').strip_prefix(':')?;
    Some((marker, rest.trim_start_matches('*').trim()))
}

/// Drop a leading `1.` or `2)` list number.
fn strip_list_number(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    match rest.strip_prefix(['.', ')']) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

/// Split `Who? A: Alice` into the question and an inline answer.
fn split_inline_answer(text: &str) -> (&str, Option<&str>) {
    for (i, _) in text.match_indices(char::is_whitespace) {
        let tail = text[i..].trim_start();
        if !tail.starts_with(|c: char| c.is_alphabetic() || c == '*') {
            continue;
        }
        if let Some((QaMarker::Answer, answer)) = match_qa_marker(tail) {
            return (text[..i].trim_end(), Some(answer));
        }
    }
    (text, None)
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn decode_qa_block(block: Option<&[&str]>) -> Decoded<Vec<QaPair>> {
    let Some(lines) = block else {
        return Decoded::fallback(Vec::new(), "Q&A section missing");
    };

    let pairs = parse_qa_lines(lines.iter().copied());
    if pairs.is_empty() {
        Decoded::fallback(pairs, "Q&A section has no complete pairs")
    } else {
        Decoded::Ok(pairs)
    }
}

/// Pair up alternating question and answer lines.
///
/// Unmarked lines continue whichever half is open. A question that is
/// never answered, and an answer with no question, are dropped.
fn parse_qa_lines<'a, I>(lines: I) -> Vec<QaPair>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Option<String> = None;

    fn flush(pairs: &mut Vec<QaPair>, question: &mut Option<String>, answer: &mut Option<String>) {
        if let (Some(q), Some(a)) = (question.take(), answer.take()) {
            if !q.is_empty() && !a.is_empty() {
                pairs.push(QaPair {
                    question: q,
                    answer: a,
                });
            }
        }
    }

    fn append(target: &mut String, text: &str) {
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(text);
    }

    for line in lines {
        match match_qa_marker(line) {
            Some((QaMarker::Question, text)) => {
                flush(&mut pairs, &mut question, &mut answer);
                let (text, inline) = split_inline_answer(text);
                question = Some(text.to_string());
                answer = inline.map(str::to_string);
            }
            Some((QaMarker::Answer, text)) => {
                if question.is_none() {
                    continue;
                }
                match answer.as_mut() {
                    Some(existing) => append(existing, text),
                    None => answer = Some(text.to_string()),
                }
            }
            None => {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(a) = answer.as_mut() {
                    append(a, text);
                } else if let Some(q) = question.as_mut() {
                    append(q, text);
                }
            }
        }
    }

    flush(&mut pairs, &mut question, &mut answer);
    pairs
}
