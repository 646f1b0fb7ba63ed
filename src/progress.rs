//! Terminal progress display.
//!
//! Shows one spinner per task while an analysis runs, driven by the
//! [`TaskUpdate`]s the orchestrator emits.

use crate::models::{TaskKind, TaskState};
use crate::orchestrator::TaskUpdate;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Spinner set for one analysis run.
pub struct ProgressDisplay {
    multi: MultiProgress,
    bars: BTreeMap<TaskKind, ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display. When `enabled` is false nothing is drawn.
    pub fn new(enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };

        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: BTreeMap::new(),
        }
    }

    /// Reflect a task state change.
    pub fn update(&mut self, update: &TaskUpdate) {
        match update.state {
            TaskState::Running => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style());
                bar.set_message(format!("{}...", update.task));
                bar.enable_steady_tick(Duration::from_millis(100));
                if let Some(previous) = self.bars.insert(update.task, bar) {
                    previous.finish_and_clear();
                }
            }
            state if state.is_terminal() => {
                let message = match (state, update.degraded) {
                    (TaskState::Failed, _) => format!("❌ {} failed", update.task),
                    (_, true) => format!("⚠️  {} (fallback)", update.task),
                    _ => format!("✅ {}", update.task),
                };
                self.finish(update.task, message);
            }
            _ => {}
        }
    }

    /// Number of spinners still turning.
    pub fn active(&self) -> usize {
        self.bars.values().filter(|b| !b.is_finished()).count()
    }

    /// Stop any spinner left running, e.g. for tasks skipped after a failure.
    pub fn finish_all(&mut self) {
        let leftover = self.active();
        if leftover > 0 {
            debug!("Stopping {} spinner(s) for tasks that never finished", leftover);
        }
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }

    fn finish(&mut self, task: TaskKind, message: String) {
        match self.bars.get(&task) {
            Some(bar) => bar.finish_with_message(message),
            None => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style());
                bar.finish_with_message(message);
                self.bars.insert(task, bar);
            }
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisResult;
    use std::collections::BTreeSet;

    fn update(task: TaskKind, state: TaskState) -> TaskUpdate {
        TaskUpdate {
            task,
            state,
            result: AnalysisResult::default(),
            active: BTreeSet::new(),
            degraded: false,
        }
    }

    #[test]
    fn test_spinner_lifecycle() {
        let mut display = ProgressDisplay::new(false);

        display.update(&update(TaskKind::Summary, TaskState::Running));
        display.update(&update(TaskKind::KeyPoints, TaskState::Running));
        assert_eq!(display.active(), 2);

        display.update(&update(TaskKind::Summary, TaskState::Succeeded));
        assert_eq!(display.active(), 1);

        display.update(&update(TaskKind::KeyPoints, TaskState::Failed));
        assert_eq!(display.active(), 0);
    }

    #[test]
    fn test_finish_all_stops_leftovers() {
        let mut display = ProgressDisplay::new(false);
        display.update(&update(TaskKind::Qa, TaskState::Running));
        display.finish_all();
        assert_eq!(display.active(), 0);
    }
}
