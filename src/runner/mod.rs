//! Pipeline runner
//!
//! Walks `pipeline -> job -> step` strictly in order on the calling thread and
//! hands every enabled step to the [`WorkerRegistry`]. An errored step ends its
//! pipeline; the remaining pipelines of the run still execute unless one of
//! their `dependsOn` pipelines failed or was skipped.
//!
//! The notifier is reset before each step, so a step that answers `Executed`
//! after raising error notifications is counted as failed.

use crate::dependency;
use crate::diagnostics::Diagnostics;
use crate::executor::{WorkerContext, WorkerRegistry};
use crate::pipeline::{
    Job, Pipeline, PipelineError, ResultState, Task, Validate, WorkerResult, codes,
};
use ahash::AHashMap;
use std::fmt;
use uuid::Uuid;

/// Whether steps execute or are only validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Execute every step
    Execute,
    /// Decode and validate step parameters only
    Validate,
}

/// Terminal status of one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Every enabled step succeeded
    Succeeded,
    /// A step errored
    Failed,
    /// The pipeline is disabled
    Disabled,
    /// A pipeline it depends on did not succeed
    Skipped {
        /// The dependency that failed
        dependency: String,
    },
}

impl PipelineStatus {
    /// Whether the status counts as a failure of the run
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped { .. })
    }
}

/// Outcome of one pipeline
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Pipeline name
    pub name: String,
    /// Terminal status
    pub status: PipelineStatus,
    /// Steps handed to the registry
    pub steps: usize,
    /// Issues raised while the pipeline ran
    pub diagnostics: Diagnostics,
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            PipelineStatus::Disabled => write!(f, "Skipped {} (disabled)", self.name),
            PipelineStatus::Skipped { dependency } => {
                write!(f, "Skipped {} (dependency {dependency} failed)", self.name)
            }
            PipelineStatus::Succeeded | PipelineStatus::Failed => {
                let errors = self.diagnostics.error_count();
                let warnings = self.diagnostics.warning_count();
                if errors == 0 && warnings == 0 {
                    write!(f, "Finished {}", self.name)
                } else {
                    write!(
                        f,
                        "Finished {} with {errors} error(s), {warnings} warning(s)",
                        self.name
                    )
                }
            }
        }
    }
}

/// Aggregated result of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier attached to the run's tracing span
    pub run_id: Uuid,
    /// Mode the run was performed in
    pub mode: RunMode,
    /// One outcome per traversed pipeline, in execution order
    pub outcomes: Vec<PipelineOutcome>,
}

impl RunSummary {
    /// One summary line per pipeline
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(ToString::to_string).collect()
    }

    /// Whether any pipeline failed or was skipped because of a failure
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.outcomes.iter().any(|o| o.status.is_failure())
    }

    /// Errors across all pipelines
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.diagnostics.error_count()).sum()
    }

    /// Warnings across all pipelines
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| o.diagnostics.warning_count())
            .sum()
    }

    /// Process exit code: `1` when the run has errors, else `0`
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }
}

/// Executes pipelines against a worker registry
#[derive(Debug)]
pub struct Runner<'a> {
    registry: &'a WorkerRegistry,
    ctx: &'a WorkerContext,
}

impl<'a> Runner<'a> {
    /// Creates a runner
    #[must_use]
    pub fn new(registry: &'a WorkerRegistry, ctx: &'a WorkerContext) -> Self {
        Self { registry, ctx }
    }

    /// Runs the pipeline named `selection`, or every pipeline in dependency order
    ///
    /// # Errors
    ///
    /// Fails when the selected pipeline does not exist or the pipeline
    /// dependencies cannot be resolved. Malformed pipelines and step failures
    /// are reported in the summary.
    pub fn run(
        &self,
        pipelines: &[Pipeline],
        selection: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        self.traverse(pipelines, selection, RunMode::Execute)
    }

    /// Validates step parameters without executing anything
    ///
    /// # Errors
    ///
    /// Same as [`Runner::run`].
    pub fn validate(
        &self,
        pipelines: &[Pipeline],
        selection: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        self.traverse(pipelines, selection, RunMode::Validate)
    }

    fn traverse(
        &self,
        pipelines: &[Pipeline],
        selection: Option<&str>,
        mode: RunMode,
    ) -> Result<RunSummary, PipelineError> {
        let selected = select(pipelines, selection)?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run = %run_id, mode = ?mode);
        let _guard = span.enter();
        tracing::info!(pipelines = selected.len(), "Starting run");

        let mut statuses: AHashMap<String, PipelineStatus> = AHashMap::new();
        let mut outcomes = Vec::with_capacity(selected.len());
        for pipeline in &selected {
            let failed_dependency = pipeline
                .depends_on
                .iter()
                .find(|d| statuses.get(d.as_str()).is_some_and(PipelineStatus::is_failure));

            let outcome = match failed_dependency {
                Some(dependency) => {
                    self.ctx.notifier.warning(format!(
                        "Skipping pipeline {}: dependency {dependency} failed",
                        pipeline.name
                    ));
                    PipelineOutcome {
                        name: pipeline.name.clone(),
                        status: PipelineStatus::Skipped {
                            dependency: dependency.clone(),
                        },
                        steps: 0,
                        diagnostics: Diagnostics::new(&pipeline.name),
                    }
                }
                None => self.run_pipeline(pipeline, mode),
            };
            statuses.insert(outcome.name.clone(), outcome.status.clone());
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            run_id,
            mode,
            outcomes,
        };
        tracing::info!(
            errors = summary.error_count(),
            warnings = summary.warning_count(),
            failed = summary.has_errors(),
            "Run finished"
        );
        Ok(summary)
    }

    fn run_pipeline(&self, pipeline: &Pipeline, mode: RunMode) -> PipelineOutcome {
        let span = tracing::info_span!("pipeline", pipeline = %pipeline.name);
        let _guard = span.enter();
        let mut diagnostics = Diagnostics::new(&pipeline.name);

        if pipeline.disabled {
            self.ctx
                .notifier
                .info(format!("Pipeline {} is disabled", pipeline.name));
            diagnostics.complete();
            return PipelineOutcome {
                name: pipeline.name.clone(),
                status: PipelineStatus::Disabled,
                steps: 0,
                diagnostics,
            };
        }

        if let Err(e) = pipeline.validate() {
            self.ctx
                .notifier
                .error(format!("Pipeline {} is invalid: {e}", pipeline.name));
            diagnostics.add_error(
                codes::INVALID_PARAMETERS,
                e.to_string(),
                pipeline.name.clone(),
                [("pipeline", pipeline.name.clone())],
            );
            diagnostics.complete();
            return PipelineOutcome {
                name: pipeline.name.clone(),
                status: PipelineStatus::Failed,
                steps: 0,
                diagnostics,
            };
        }

        let mut steps = 0;
        let mut failed = false;
        'jobs: for job in &pipeline.jobs {
            if job.disabled {
                self.ctx.notifier.info(format!("Job {} is disabled", job.name));
                continue;
            }
            tracing::info!(job = %job.name, steps = job.steps.len(), "Starting job");
            for step in &job.steps {
                if step.disabled {
                    self.ctx
                        .notifier
                        .info(format!("Step {} is disabled", step.display_name()));
                    continue;
                }
                steps += 1;
                let ok = match mode {
                    RunMode::Execute => self.execute_step(pipeline, job, step, &mut diagnostics),
                    RunMode::Validate => self.validate_step(pipeline, job, step, &mut diagnostics),
                };
                if !ok {
                    failed = true;
                    if mode == RunMode::Execute {
                        tracing::error!(job = %job.name, step = %step, "Step failed, stopping pipeline");
                        break 'jobs;
                    }
                }
            }
        }

        diagnostics.complete();
        tracing::info!(
            steps,
            errors = diagnostics.error_count(),
            warnings = diagnostics.warning_count(),
            elapsed_ms = diagnostics.elapsed().map_or(0, |d| d.as_millis()),
            "Pipeline finished"
        );
        PipelineOutcome {
            name: pipeline.name.clone(),
            status: if failed {
                PipelineStatus::Failed
            } else {
                PipelineStatus::Succeeded
            },
            steps,
            diagnostics,
        }
    }

    fn execute_step(
        &self,
        pipeline: &Pipeline,
        job: &Job,
        step: &Task,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        self.ctx.notifier.reset();
        let mut result = self.registry.run(step, self.ctx);
        if result.state == ResultState::Executed && self.ctx.notifier.has_errors() {
            result = WorkerResult::errored(
                codes::EXECUTION_FAILED,
                format!("{step} reported errors"),
            );
        }
        let metadata = step_metadata(pipeline, job, step);

        if self.ctx.notifier.has_warnings() {
            diagnostics.add_warning(
                codes::EXECUTION_FAILED,
                "step reported warnings",
                step.display_name(),
                metadata.clone(),
            );
        }

        match result.state {
            ResultState::Errored => {
                self.ctx.notifier.error(format!("{step} failed: {result}"));
                diagnostics.add_error(
                    result.error_code.clone(),
                    result.error_message(),
                    step.display_name(),
                    metadata,
                );
                false
            }
            ResultState::Ignored => {
                tracing::debug!(step = %step, "Step ignored");
                true
            }
            ResultState::Executed | ResultState::Valid => {
                tracing::debug!(
                    step = %step,
                    attempts = result.attempts,
                    duration_ms = result.duration_ms,
                    "Step executed"
                );
                true
            }
        }
    }

    fn validate_step(
        &self,
        pipeline: &Pipeline,
        job: &Job,
        step: &Task,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let report = self.registry.validate(step, self.ctx);
        let metadata = step_metadata(pipeline, job, step);
        if !report.claimed {
            diagnostics.add_warning(
                codes::IGNORED,
                format!("no worker handles kind '{}'", step.kind),
                step.display_name(),
                metadata,
            );
            return true;
        }
        for result in report
            .results
            .iter()
            .filter(|r| r.state == ResultState::Errored)
        {
            self.ctx.notifier.error(format!("{step} is invalid: {result}"));
            diagnostics.add_error(
                result.error_code.clone(),
                result.error_message(),
                step.display_name(),
                metadata.clone(),
            );
        }
        report.is_valid()
    }
}

fn step_metadata(pipeline: &Pipeline, job: &Job, step: &Task) -> Vec<(&'static str, String)> {
    vec![
        ("pipeline", pipeline.name.clone()),
        ("job", job.name.clone()),
        ("kind", step.kind.to_string()),
    ]
}

fn select(pipelines: &[Pipeline], selection: Option<&str>) -> Result<Vec<Pipeline>, PipelineError> {
    let selected = match selection {
        Some(name) => pipelines
            .iter()
            .find(|p| p.name == name)
            .map(|p| vec![p.clone()])
            .ok_or_else(|| PipelineError::NotFound(name.to_string()))?,
        None => dependency::resolve(pipelines.to_vec())?,
    };
    Ok(selected)
}
