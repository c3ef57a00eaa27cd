//! Worker registry
//!
//! Offers each task to the registered workers in order. The first worker that
//! does not answer `Ignored` claims it. A task nobody claims is logged and
//! reported as `Ignored`, so configurations may mention kinds this build does
//! not know.

use crate::executor::traits::{Worker, WorkerContext};
use crate::pipeline::{ResultState, Task, TaskKind, WorkerResult};
use crate::workers;

/// Aggregated validation outcome of one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Non-ignored, non-valid results in registry order
    pub results: Vec<WorkerResult>,
    /// Whether any worker claimed the task
    pub claimed: bool,
}

impl ValidationReport {
    /// Whether no aggregated result is `Errored`
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.results.iter().any(|r| r.state == ResultState::Errored)
    }

    /// Error messages of the aggregated results
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.state == ResultState::Errored)
            .map(ToString::to_string)
            .collect()
    }
}

/// Ordered collection of workers
#[derive(Default)]
pub struct WorkerRegistry {
    workers: Vec<Box<dyn Worker>>,
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl WorkerRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in worker
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for worker in workers::builtin() {
            registry.register(worker);
        }
        registry
    }

    /// Appends a worker
    pub fn register(&mut self, worker: Box<dyn Worker>) {
        tracing::debug!(kind = %worker.kind(), "Worker registered");
        self.workers.push(worker);
    }

    /// Kinds of the registered workers, in order
    #[must_use]
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.workers.iter().map(|w| w.kind()).collect()
    }

    /// Runs `task` on the first worker that claims it
    pub fn run(&self, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        for worker in &self.workers {
            let result = worker.run(task, ctx);
            if result.state != ResultState::Ignored {
                tracing::debug!(task = %task, state = %result.state, "Task claimed");
                return result;
            }
        }
        tracing::debug!(task = %task, kind = %task.kind, "No worker claimed the task");
        WorkerResult::ignored()
    }

    /// Validates `task` against every worker
    pub fn validate(&self, task: &Task, ctx: &WorkerContext) -> ValidationReport {
        let mut report = ValidationReport::default();
        for worker in &self.workers {
            let result = worker.validate(task, ctx);
            match result.state {
                ResultState::Ignored => {}
                ResultState::Valid => report.claimed = true,
                _ => {
                    report.claimed = true;
                    report.results.push(result);
                }
            }
        }
        if !report.claimed {
            tracing::debug!(task = %task, kind = %task.kind, "No worker validated the task");
        }
        report
    }
}
