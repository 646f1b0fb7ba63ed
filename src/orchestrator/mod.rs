//! Orchestration of analysis tasks against a generation backend.
//!
//! The orchestrator itself is stateless: every call to [`Orchestrator::run`]
//! validates its inputs and starts a fresh [`run::AnalysisRun`]. Progress
//! is exposed as a stream of [`RunEvent`]s so a caller can render partial
//! results while later tasks are still running.

pub mod run;

pub use run::{RunEvent, RunOutcome, TaskUpdate};

use crate::backend::{GenerationBackend, GenerationOptions};
use crate::error::AnalysisError;
use crate::models::AnalysisConfig;
use futures::stream::{self, Stream};
use run::AnalysisRun;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How tasks are sent to the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One request per task, replies decoded per task.
    #[default]
    PerTask,
    /// One request for all tasks, reply decoded as a sectioned document.
    Combined,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::PerTask => write!(f, "per-task"),
            RunMode::Combined => write!(f, "combined"),
        }
    }
}

/// What happens to remaining tasks after a backend failure in per-task
/// mode. Combined mode succeeds or fails as a whole either way.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure; later tasks stay pending.
    #[default]
    FailFast,
    /// Keep going and report each failure.
    FailSoft,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::FailSoft => write!(f, "fail-soft"),
        }
    }
}

/// Runs analysis tasks against a backend.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    mode: RunMode,
    policy: FailurePolicy,
    options: GenerationOptions,
}

impl Orchestrator {
    pub fn new(mode: RunMode, policy: FailurePolicy, options: GenerationOptions) -> Self {
        Self {
            mode,
            policy,
            options,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Start a run. Validation errors are returned before any backend
    /// call; after that every outcome is reported through the stream,
    /// which ends with exactly one [`RunEvent::Finished`].
    pub fn run<'a, B: GenerationBackend>(
        &self,
        text: &str,
        config: &AnalysisConfig,
        backend: &'a B,
    ) -> Result<impl Stream<Item = RunEvent> + 'a, AnalysisError> {
        let run = self.start(text, config, backend)?;

        Ok(stream::unfold(Some(run), |state| async move {
            let mut run = state?;
            match run.advance().await {
                Some(update) => Some((RunEvent::Progress(update), Some(run))),
                None => Some((RunEvent::Finished(run.into_outcome()), None)),
            }
        }))
    }

    /// Drive a run to the end, passing every update to `observer`.
    #[allow(dead_code)] // Convenience wrapper for callers that don't need the stream
    pub async fn run_to_completion<B, F>(
        &self,
        text: &str,
        config: &AnalysisConfig,
        backend: &B,
        mut observer: F,
    ) -> Result<RunOutcome, AnalysisError>
    where
        B: GenerationBackend,
        F: FnMut(&TaskUpdate),
    {
        let mut run = self.start(text, config, backend)?;
        while let Some(update) = run.advance().await {
            observer(&update);
        }
        Ok(run.into_outcome())
    }

    fn start<'a, B: GenerationBackend>(
        &self,
        text: &str,
        config: &AnalysisConfig,
        backend: &'a B,
    ) -> Result<AnalysisRun<'a, B>, AnalysisError> {
        preflight(text, config)?;
        debug!(
            "Starting {} run ({}) for {} tasks via {}",
            self.mode,
            self.policy,
            config.enabled_tasks.len(),
            backend.describe()
        );
        Ok(AnalysisRun::new(
            backend,
            text,
            config,
            self.options,
            self.mode,
            self.policy,
        ))
    }
}

/// Checks made before anything is sent to the backend.
fn preflight(text: &str, config: &AnalysisConfig) -> Result<(), AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::ScriptedBackend;
    use crate::error::BackendError;
    use crate::models::{Entity, Sentiment, SentimentLabel, TaskKind, TaskState};
    use futures::StreamExt;

    const TEXT: &str = "Alice works at Acme. She started in 2020.";

    fn per_task(policy: FailurePolicy) -> Orchestrator {
        Orchestrator::new(RunMode::PerTask, policy, GenerationOptions::default())
    }

    fn combined() -> Orchestrator {
        Orchestrator::new(
            RunMode::Combined,
            FailurePolicy::FailFast,
            GenerationOptions::default(),
        )
    }

    fn all_replies() -> Vec<&'static str> {
        vec![
            "Alice joined Acme in 2020.",
            "- Alice works at Acme\n- She started in 2020",
            r#"{"sentiment": "neutral", "score": 0.6, "justification": "Factual."}"#,
            r#"[{"text":"Alice","type":"person"},{"text":"Acme","type":"organization"}]"#,
            r#"[{"question":"Where does Alice work?","answer":"Acme"}]"#,
        ]
    }

    #[tokio::test]
    async fn test_one_call_per_task_in_order() {
        let backend = ScriptedBackend::replying(all_replies());
        let outcome = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &AnalysisConfig::default(), &backend, |_| {})
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(backend.calls(), 5);

        let prompts = backend.prompts();
        assert!(prompts[0].starts_with("Summarize"));
        assert!(prompts[1].starts_with("Extract exactly 5 key points"));
        assert!(prompts[2].contains("\"sentiment\""));
        assert!(prompts[3].contains("named entities"));
        assert!(prompts[4].contains("\"question\""));

        let result = &outcome.result;
        assert_eq!(result.summary.as_deref(), Some("Alice joined Acme in 2020."));
        assert_eq!(result.key_points.as_ref().map(Vec::len), Some(2));
        assert_eq!(result.sentiment.as_ref().map(|s| s.score), Some(Some(0.6)));
        assert_eq!(result.entities.as_ref().map(Vec::len), Some(2));
        assert_eq!(result.qa.as_ref().map(Vec::len), Some(1));
        assert_eq!(outcome.tasks_in(TaskState::Succeeded), TaskKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_only_enabled_tasks_are_called() {
        let backend = ScriptedBackend::replying(["Short.", "[]"]);
        let config = AnalysisConfig::with_tasks([TaskKind::Qa, TaskKind::Summary]);
        let outcome = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &config, &backend, |_| {})
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert!(backend.prompts()[0].starts_with("Summarize"));
        assert_eq!(outcome.result.summary.as_deref(), Some("Short."));
        assert_eq!(outcome.result.qa, Some(vec![]));
        assert!(outcome.result.sentiment.is_none());
        assert_eq!(outcome.states.len(), 2);
    }

    #[tokio::test]
    async fn test_entities_scenario() {
        let backend = ScriptedBackend::replying([
            r#"[{"text":"Alice","type":"person"},{"text":"Acme","type":"organization"},{"text":"2020","type":"date"}]"#,
        ]);
        let config = AnalysisConfig::with_tasks([TaskKind::Entities]);
        let outcome = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &config, &backend, |_| {})
            .await
            .unwrap();

        let entity = |kind: &str, name: &str| Entity {
            kind: kind.to_string(),
            name: name.to_string(),
        };
        assert_eq!(
            outcome.result.entities,
            Some(vec![
                entity("person", "Alice"),
                entity("organization", "Acme"),
                entity("date", "2020"),
            ])
        );
        assert!(outcome.result.summary.is_none());
        assert!(outcome.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_no_tasks_enabled_makes_no_calls() {
        let backend = ScriptedBackend::default();
        let config = AnalysisConfig::with_tasks([]);

        let err = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &config, &backend, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::NoTasksEnabled);
        assert!(per_task(FailurePolicy::FailFast)
            .run(TEXT, &config, &backend)
            .is_err());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let backend = ScriptedBackend::default();
        for text in ["", "   \n\t"] {
            let err = combined()
                .run_to_completion(text, &AnalysisConfig::default(), &backend, |_| {})
                .await
                .unwrap_err();
            assert_eq!(err, AnalysisError::EmptyInput);
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let backend = ScriptedBackend::default();
        let mut config = AnalysisConfig::default();
        config.key_point_count = 0;
        let err = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &config, &backend, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_fail_fast_keeps_partial_result() {
        let backend = ScriptedBackend::new([
            Ok("Alice joined Acme.".to_string()),
            Err(BackendError::new("HTTP 503")),
        ]);
        let mut updates = Vec::new();
        let outcome = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &AnalysisConfig::default(), &backend, |u| {
                updates.push((u.task, u.state))
            })
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(
            outcome.error,
            Some(AnalysisError::Backend {
                task: Some(TaskKind::KeyPoints),
                source: BackendError::new("HTTP 503"),
            })
        );
        assert_eq!(outcome.result.summary.as_deref(), Some("Alice joined Acme."));
        assert!(outcome.result.key_points.is_none());

        assert_eq!(outcome.states[&TaskKind::Summary], TaskState::Succeeded);
        assert_eq!(outcome.states[&TaskKind::KeyPoints], TaskState::Failed);
        for task in [TaskKind::Sentiment, TaskKind::Entities, TaskKind::Qa] {
            assert_eq!(outcome.states[&task], TaskState::Pending);
            assert!(!updates.contains(&(task, TaskState::Running)));
        }
        assert_eq!(
            updates,
            vec![
                (TaskKind::Summary, TaskState::Running),
                (TaskKind::Summary, TaskState::Succeeded),
                (TaskKind::KeyPoints, TaskState::Running),
                (TaskKind::KeyPoints, TaskState::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_soft_continues() {
        let mut replies: Vec<Result<String, BackendError>> =
            all_replies().into_iter().map(|r| Ok(r.to_string())).collect();
        replies[1] = Err(BackendError::new("empty reply"));
        let backend = ScriptedBackend::new(replies);

        let outcome = per_task(FailurePolicy::FailSoft)
            .run_to_completion(TEXT, &AnalysisConfig::default(), &backend, |_| {})
            .await
            .unwrap();

        assert_eq!(backend.calls(), 5);
        assert!(!outcome.is_success());
        assert_eq!(outcome.tasks_in(TaskState::Failed), vec![TaskKind::KeyPoints]);
        assert_eq!(outcome.tasks_in(TaskState::Succeeded).len(), 4);
        assert!(outcome.failures.contains_key(&TaskKind::KeyPoints));
        assert!(outcome.result.qa.is_some());
    }

    #[tokio::test]
    async fn test_decode_fallback_still_succeeds() {
        let backend = ScriptedBackend::replying(["not json", "not json", "not json"]);
        let config =
            AnalysisConfig::with_tasks([TaskKind::Sentiment, TaskKind::Entities, TaskKind::Qa]);
        let mut degraded_updates = 0;
        let outcome = per_task(FailurePolicy::FailFast)
            .run_to_completion(TEXT, &config, &backend, |u| {
                if u.degraded {
                    degraded_updates += 1;
                }
            })
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(degraded_updates, 3);
        assert_eq!(outcome.degraded.len(), 3);
        assert_eq!(outcome.result.sentiment, Some(Sentiment::undetermined()));
        assert_eq!(outcome.result.entities, Some(vec![]));
        assert_eq!(outcome.result.qa, Some(vec![]));
    }

    #[tokio::test]
    async fn test_combined_scenario() {
        let backend =
            ScriptedBackend::replying(["Summary:\nShort text.\n\nKey Points:\n- One\n- Two\n"]);
        let outcome = combined()
            .run_to_completion(TEXT, &AnalysisConfig::default(), &backend, |_| {})
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert!(backend.prompts()[0].contains("Questions & Answers:"));

        let result = &outcome.result;
        assert_eq!(result.summary.as_deref(), Some("Short text."));
        assert_eq!(
            result.key_points,
            Some(vec!["One".to_string(), "Two".to_string()])
        );
        assert_eq!(
            result.sentiment.as_ref().map(|s| s.label),
            Some(SentimentLabel::Neutral)
        );
        assert_eq!(result.entities, Some(vec![]));
        assert_eq!(result.qa, Some(vec![]));
        assert_eq!(outcome.tasks_in(TaskState::Succeeded).len(), 5);
        assert_eq!(
            outcome.degraded.iter().copied().collect::<Vec<_>>(),
            vec![TaskKind::Sentiment, TaskKind::Entities, TaskKind::Qa]
        );
    }

    #[tokio::test]
    async fn test_combined_merges_enabled_fields_only() {
        let backend = ScriptedBackend::replying([
            "Summary:\nShort.\nSentiment Analysis:\nPositive: upbeat\n",
        ]);
        let config = AnalysisConfig::with_tasks([TaskKind::Sentiment]);
        let outcome = combined()
            .run_to_completion(TEXT, &config, &backend, |_| {})
            .await
            .unwrap();

        assert!(outcome.result.summary.is_none());
        assert_eq!(
            outcome.result.sentiment.map(|s| s.label),
            Some(SentimentLabel::Positive)
        );
    }

    #[tokio::test]
    async fn test_combined_failure_is_atomic() {
        let backend = ScriptedBackend::new([Err(BackendError::new("timeout"))]);
        let mut updates = Vec::new();
        let outcome = Orchestrator::new(
            RunMode::Combined,
            FailurePolicy::FailSoft,
            GenerationOptions::default(),
        )
        .run_to_completion(TEXT, &AnalysisConfig::default(), &backend, |u| {
            updates.push(u.clone())
        })
        .await
        .unwrap();

        assert_eq!(backend.calls(), 1);
        assert!(outcome.result.is_empty());
        assert_eq!(outcome.tasks_in(TaskState::Failed).len(), 5);
        assert!(matches!(
            outcome.error,
            Some(AnalysisError::Backend { task: None, .. })
        ));

        // All five go running together before the single request resolves.
        assert_eq!(updates.len(), 10);
        assert_eq!(updates[4].active.len(), 5);
        assert!(updates[9].active.is_empty());
    }

    #[tokio::test]
    async fn test_stream_reports_progress() {
        let backend = ScriptedBackend::replying(["Short.", "- a\n- b"]);
        let config = AnalysisConfig::with_tasks([TaskKind::Summary, TaskKind::KeyPoints]);
        let orchestrator = per_task(FailurePolicy::FailFast);

        let events: Vec<RunEvent> = orchestrator
            .run(TEXT, &config, &backend)
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 5);
        let progress: Vec<&TaskUpdate> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress(u) => Some(u),
                RunEvent::Finished(_) => None,
            })
            .collect();

        assert_eq!(progress[0].state, TaskState::Running);
        assert!(progress[0].active.contains(&TaskKind::Summary));
        assert!(progress[0].result.is_empty());

        assert_eq!(progress[1].state, TaskState::Succeeded);
        assert!(progress[1].active.is_empty());
        assert_eq!(progress[1].result.summary.as_deref(), Some("Short."));
        assert!(progress[1].result.key_points.is_none());

        assert_eq!(progress[3].task, TaskKind::KeyPoints);
        assert_eq!(progress[3].result.key_points.as_ref().map(Vec::len), Some(2));

        match events.last() {
            Some(RunEvent::Finished(outcome)) => assert!(outcome.is_success()),
            other => panic!("expected Finished, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runs_do_not_share_state() {
        let orchestrator = per_task(FailurePolicy::FailFast);
        let config = AnalysisConfig::with_tasks([TaskKind::Summary]);

        let first_backend = ScriptedBackend::replying(["First run."]);
        let second_backend = ScriptedBackend::new([Err(BackendError::new("down"))]);

        let first = orchestrator
            .run_to_completion(TEXT, &config, &first_backend, |_| {})
            .await
            .unwrap();
        let second = orchestrator
            .run_to_completion(TEXT, &config, &second_backend, |_| {})
            .await
            .unwrap();

        assert_eq!(first.result.summary.as_deref(), Some("First run."));
        assert!(first.is_success());
        assert!(second.result.summary.is_none());
        assert_eq!(second.states[&TaskKind::Summary], TaskState::Failed);
    }

    #[test]
    fn test_defaults() {
        let orchestrator = Orchestrator::default();
        assert_eq!(orchestrator.mode(), RunMode::PerTask);
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
        assert_eq!(RunMode::Combined.to_string(), "combined");
    }
}
