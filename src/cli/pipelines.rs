//! `locally pipelines` - Run, validate and list pipelines

use anyhow::Result;
use clap::ValueEnum;
use locally::executor::WorkerRegistry;
use locally::pipeline::Pipeline;
use locally::runner::{RunSummary, Runner};
use std::process::ExitCode;

use super::app::App;

/// Pipeline operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PipelineAction {
    /// Execute pipelines
    Run,
    /// Validate step parameters without executing
    Validate,
    /// List pipelines, or the jobs and steps of one pipeline
    List,
}

/// Executes a `pipelines` subcommand
pub fn run(app: &App, action: PipelineAction, name: Option<&str>) -> Result<ExitCode> {
    let context = app.context()?;

    if action == PipelineAction::List {
        let lines = match name {
            Some(name) => {
                let pipeline = context
                    .pipeline(name)
                    .ok_or_else(|| anyhow::anyhow!("Pipeline '{name}' not found"))?;
                describe(pipeline)
            }
            None => context.pipelines.iter().map(overview).collect(),
        };
        for line in lines {
            println!("{line}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = app.worker_context(Some(context.clone()))?;
    let registry = WorkerRegistry::with_builtin();
    let runner = Runner::new(&registry, &ctx);
    let summary = match action {
        PipelineAction::Validate => runner.validate(&context.pipelines, name)?,
        _ => runner.run(&context.pipelines, name)?,
    };
    report(app, &summary);
    Ok(if summary.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn report(app: &App, summary: &RunSummary) {
    for outcome in &summary.outcomes {
        for issue in outcome.diagnostics.issues() {
            tracing::debug!(pipeline = %outcome.name, %issue, "Pipeline issue");
        }
        let line = outcome.to_string();
        if outcome.status.is_failure() {
            app.notifier.warning(line);
        } else {
            app.notifier.success(line);
        }
    }
}

fn overview(pipeline: &Pipeline) -> String {
    let mut line = format!(
        "{} ({} jobs, {} steps)",
        pipeline.name,
        pipeline.jobs.len(),
        pipeline.step_count()
    );
    if pipeline.disabled {
        line.push_str(" [disabled]");
    }
    if !pipeline.depends_on.is_empty() {
        line.push_str(&format!(" depends on {}", pipeline.depends_on.join(", ")));
    }
    line
}

fn describe(pipeline: &Pipeline) -> Vec<String> {
    let mut lines = vec![overview(pipeline)];
    for job in &pipeline.jobs {
        let marker = if job.disabled { " [disabled]" } else { "" };
        lines.push(format!("  {}{marker}", job.name));
        for step in &job.steps {
            let marker = if step.disabled { " [disabled]" } else { "" };
            lines.push(format!("    {step}{marker}"));
        }
    }
    lines
}
