//! Pipeline and job definitions

#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

use crate::dependency::Dependable;
use crate::pipeline::errors::ValidationError;
use crate::pipeline::task::Task;
use crate::pipeline::types::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Maximum length of pipeline and job names
pub const MAX_NAME_LEN: usize = 128;

/// Named pipeline: an ordered list of jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Skip the whole pipeline
    #[serde(default)]
    pub disabled: bool,

    /// Free form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Other pipelines that must succeed first within the same run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Pipelines depending on this one, filled by the dependency resolver
    #[serde(skip)]
    pub required_by: Vec<String>,

    /// Jobs, executed in order
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// A job: an ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job name
    pub name: String,

    /// Skip the job
    #[serde(default)]
    pub disabled: bool,

    /// Steps, executed in order
    #[serde(default)]
    pub steps: Vec<Task>,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            max: MAX_NAME_LEN,
            len: name.len(),
        });
    }
    Ok(())
}

impl Validate for Pipeline {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        validate_name(&self.name)?;

        if self.jobs.is_empty() {
            return Err(ValidationError::EmptyPipeline {
                pipeline: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !job.disabled {
                job.validate()?;
            }
            if !seen.insert(job.name.as_str()) {
                return Err(ValidationError::DuplicateName {
                    kind: "job",
                    name: job.name.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for Job {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        validate_name(&self.name)?;
        if self.steps.is_empty() {
            return Err(ValidationError::EmptyJob {
                job: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl Pipeline {
    /// Creates an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disabled: false,
            tags: Vec::new(),
            depends_on: Vec::new(),
            required_by: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Appends a job
    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Adds a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Declares a dependency on another pipeline
    pub fn depends_on(mut self, pipeline: impl Into<String>) -> Self {
        self.depends_on.push(pipeline.into());
        self
    }

    /// Marks the pipeline disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Total number of steps across jobs
    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|j| j.steps.len()).sum()
    }
}

impl Job {
    /// Creates a job from its steps
    pub fn new(name: impl Into<String>, steps: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            disabled: false,
            steps,
        }
    }

    /// Marks the job disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

impl Dependable for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    fn set_required_by(&mut self, required_by: Vec<String>) {
        self.required_by = required_by;
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline({}): {} jobs, {} steps",
            self.name,
            self.jobs.len(),
            self.step_count()
        )
    }
}
