//! Per-run state machine.
//!
//! An [`AnalysisRun`] owns everything that changes during one analysis:
//! task states, the active process set and the result aggregate. Nothing
//! is shared between runs.

use super::{FailurePolicy, RunMode};
use crate::backend::{GenerationBackend, GenerationOptions};
use crate::decode::{self, Decoded};
use crate::error::{AnalysisError, BackendError};
use crate::models::{AnalysisConfig, AnalysisResult, TaskKind, TaskOutput, TaskState};
use crate::prompt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, warn};

/// A task changed state.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub task: TaskKind,
    pub state: TaskState,
    /// Snapshot of the aggregate after this transition.
    pub result: AnalysisResult,
    /// Tasks currently running, after this transition.
    pub active: BTreeSet<TaskKind>,
    /// The task succeeded with a fallback value.
    pub degraded: bool,
}

/// Item of the stream returned by [`super::Orchestrator::run`].
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress(TaskUpdate),
    /// Always the last event of a run.
    Finished(RunOutcome),
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: AnalysisResult,
    pub states: BTreeMap<TaskKind, TaskState>,
    /// Tasks that succeeded with a fallback value.
    pub degraded: BTreeSet<TaskKind>,
    /// Backend failures by task.
    pub failures: BTreeMap<TaskKind, BackendError>,
    /// The error that ended or marred the run, if any.
    pub error: Option<AnalysisError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Tasks that finished in the given state, in dispatch order.
    pub fn tasks_in(&self, state: TaskState) -> Vec<TaskKind> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(t, _)| *t)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Mark the task at this queue index running.
    Start(usize),
    /// Call the backend for the task at this queue index.
    Call(usize),
    /// Call the backend once for every queued task.
    CallCombined,
    Finished,
}

pub(crate) struct AnalysisRun<'a, B> {
    backend: &'a B,
    text: String,
    config: AnalysisConfig,
    options: GenerationOptions,
    mode: RunMode,
    policy: FailurePolicy,
    queue: Vec<TaskKind>,
    phase: Phase,
    states: BTreeMap<TaskKind, TaskState>,
    active: BTreeSet<TaskKind>,
    result: AnalysisResult,
    degraded: BTreeSet<TaskKind>,
    failures: BTreeMap<TaskKind, BackendError>,
    error: Option<AnalysisError>,
    /// Updates produced together in combined mode, not yet handed out.
    buffered: VecDeque<TaskUpdate>,
}

impl<'a, B: GenerationBackend> AnalysisRun<'a, B> {
    /// Inputs must already have passed pre-flight validation.
    pub(crate) fn new(
        backend: &'a B,
        text: &str,
        config: &AnalysisConfig,
        options: GenerationOptions,
        mode: RunMode,
        policy: FailurePolicy,
    ) -> Self {
        let queue: Vec<TaskKind> = config.enabled_tasks.iter().copied().collect();
        let states = queue.iter().map(|t| (*t, TaskState::Pending)).collect();

        Self {
            backend,
            text: text.to_string(),
            config: config.clone(),
            options,
            mode,
            policy,
            queue,
            phase: Phase::Start(0),
            states,
            active: BTreeSet::new(),
            result: AnalysisResult::default(),
            degraded: BTreeSet::new(),
            failures: BTreeMap::new(),
            error: None,
            buffered: VecDeque::new(),
        }
    }

    /// Perform the next step of the run. Returns `None` once finished.
    pub(crate) async fn advance(&mut self) -> Option<TaskUpdate> {
        if let Some(update) = self.buffered.pop_front() {
            return Some(update);
        }

        match (self.mode, self.phase) {
            (_, Phase::Finished) => None,
            (RunMode::PerTask, Phase::Start(index)) => {
                let Some(task) = self.queue.get(index).copied() else {
                    self.phase = Phase::Finished;
                    return None;
                };
                info!("Running {} task", task);
                self.phase = Phase::Call(index);
                Some(self.transition(task, TaskState::Running))
            }
            (RunMode::PerTask, Phase::Call(index)) => {
                let task = self.queue[index];
                let update = self.call_single(task).await;
                if self.phase == Phase::Call(index) {
                    self.phase = Phase::Start(index + 1);
                }
                Some(update)
            }
            (RunMode::Combined, Phase::Start(_)) => {
                info!("Running {} tasks in one combined request", self.queue.len());
                for task in self.queue.clone() {
                    let update = self.transition(task, TaskState::Running);
                    self.buffered.push_back(update);
                }
                self.phase = Phase::CallCombined;
                self.buffered.pop_front()
            }
            (RunMode::Combined, Phase::CallCombined) => {
                self.call_combined().await;
                self.phase = Phase::Finished;
                self.buffered.pop_front()
            }
            (mode, phase) => {
                warn!("Run in {:?} mode reached unexpected phase {:?}", mode, phase);
                self.phase = Phase::Finished;
                None
            }
        }
    }

    /// Consume the run, returning its final state.
    pub(crate) fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            result: self.result,
            states: self.states,
            degraded: self.degraded,
            failures: self.failures,
            error: self.error,
        }
    }

    async fn call_single(&mut self, task: TaskKind) -> TaskUpdate {
        let instruction = prompt::build(task, &self.config, &self.text);
        debug!("{} prompt: {} bytes", task, instruction.len());

        match self.backend.generate(&instruction, &self.options).await {
            Ok(reply) => {
                debug!("{} reply: {} bytes", task, reply.len());
                let degraded = self.store(task, decode::decode_task(task, &reply));
                info!("{} task succeeded", task);
                let mut update = self.transition(task, TaskState::Succeeded);
                update.degraded = degraded;
                update
            }
            Err(e) => {
                warn!("{} task failed: {}", task, e);
                self.failures.insert(task, e.clone());
                if self.error.is_none() {
                    self.error = Some(AnalysisError::Backend {
                        task: Some(task),
                        source: e,
                    });
                }
                if self.policy == FailurePolicy::FailFast {
                    info!("Aborting remaining tasks after {} failure", task);
                    self.phase = Phase::Finished;
                }
                self.transition(task, TaskState::Failed)
            }
        }
    }

    async fn call_combined(&mut self) {
        let instruction = prompt::build_combined(&self.config, &self.text);
        debug!("Combined prompt: {} bytes", instruction.len());

        match self.backend.generate(&instruction, &self.options).await {
            Ok(reply) => {
                debug!("Combined reply: {} bytes", reply.len());
                let sections = decode::decode_combined(&reply);
                for task in self.queue.clone() {
                    let degraded = self.store(task, sections.output(task));
                    let mut update = self.transition(task, TaskState::Succeeded);
                    update.degraded = degraded;
                    self.buffered.push_back(update);
                }
                info!("Combined analysis succeeded");
            }
            Err(e) => {
                warn!("Combined analysis failed: {}", e);
                for task in self.queue.clone() {
                    self.failures.insert(task, e.clone());
                    let update = self.transition(task, TaskState::Failed);
                    self.buffered.push_back(update);
                }
                self.error = Some(AnalysisError::Backend {
                    task: None,
                    source: e,
                });
            }
        }
    }

    /// Merge a decoded output. Returns true if it was a fallback.
    fn store(&mut self, task: TaskKind, decoded: Decoded<TaskOutput>) -> bool {
        let degraded = decoded.is_degraded();
        if let Some(reason) = decoded.reason() {
            warn!("{} reply could not be decoded, using fallback: {}", task, reason);
            self.degraded.insert(task);
        }
        if !self.result.merge(decoded.into_value()) {
            warn!("{} result already present, keeping the first one", task);
        }
        degraded
    }

    fn transition(&mut self, task: TaskKind, next: TaskState) -> TaskUpdate {
        let current = self.states.get(&task).copied().unwrap_or(TaskState::Pending);
        if current.can_transition_to(next) {
            self.states.insert(task, next);
            if next == TaskState::Running {
                self.active.insert(task);
            } else {
                self.active.remove(&task);
            }
        } else {
            warn!("Ignoring illegal transition of {} from {} to {}", task, current, next);
        }

        TaskUpdate {
            task,
            state: self.states.get(&task).copied().unwrap_or(current),
            result: self.result.clone(),
            active: self.active.clone(),
            degraded: false,
        }
    }
}
