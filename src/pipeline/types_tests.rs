//! Tests for pipeline types
//!
//! This module contains tests for the pipeline domain types

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_result_state_predicates() {
    assert!(ResultState::Executed.is_executed());
    assert!(!ResultState::Valid.is_executed());
    assert!(ResultState::Errored.is_errored());
    assert!(ResultState::Ignored.is_ignored());
    assert!(ResultState::Valid.is_valid());
}

#[test]
fn test_result_state_display() {
    assert_eq!(ResultState::Ignored.to_string(), "IGNORED");
    assert_eq!(ResultState::Valid.to_string(), "VALID");
    assert_eq!(ResultState::Executed.to_string(), "EXECUTED");
    assert_eq!(ResultState::Errored.to_string(), "ERRORED");
}

#[test]
fn test_result_state_serialize() {
    let json = serde_json::to_string(&ResultState::Executed).unwrap();
    assert_eq!(json, r#""executed""#);
}

#[test]
fn test_ignored_result_carries_code_100() {
    let result = WorkerResult::ignored();
    assert_eq!(result.state, ResultState::Ignored);
    assert_eq!(result.error_code, "100");
}

#[test]
fn test_errored_result_display() {
    let result = WorkerResult::errored(codes::INVALID_PARAMETERS, "command is required");
    assert_eq!(result.to_string(), "ERRORED [400] command is required");
    assert_eq!(result.error_message(), "command is required");
}

#[test]
fn test_worker_result_serializes_camel_case() {
    let result = WorkerResult::executed("done").with_status_code("0");
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["statusCode"], "0");
    assert_eq!(value["output"], "done");
    assert!(value.get("error").is_none());
}

#[test]
fn test_validation_error_messages() {
    assert!(ValidationError::EmptyName.to_string().contains("empty"));

    let err = ValidationError::NameTooLong { max: 128, len: 150 };
    assert!(err.to_string().contains("128"));
    assert!(err.to_string().contains("150"));

    let err = ValidationError::EmptyJob {
        job: "build".to_string(),
    };
    assert!(err.to_string().contains("build"));
    assert!(err.to_string().contains("at least one step"));
}

#[test]
fn test_pipeline_error_from_validation() {
    let pipeline_err = PipelineError::from(ValidationError::EmptyName);
    assert!(matches!(pipeline_err, PipelineError::Validation(_)));
}

#[test]
fn test_pipeline_error_from_dependency_error() {
    let pipeline_err = PipelineError::from(crate::dependency::DependencyError::Missing {
        artefact: "deploy".to_string(),
        dependency: "build".to_string(),
    });
    assert_eq!(
        pipeline_err.to_string(),
        "'deploy' depends on unknown artefact 'build'"
    );
}

#[test]
fn test_pipeline_validation() {
    let pipeline = Pipeline::new("setup").with_job(Job::new(
        "prepare",
        vec![Task::new("hello", TaskKind::Bash).with_input("command", "echo hello")],
    ));
    assert!(pipeline.validate().is_ok());

    let empty = Pipeline::new("setup");
    assert_eq!(
        empty.validate(),
        Err(ValidationError::EmptyPipeline {
            pipeline: "setup".to_string()
        })
    );
}

#[test]
fn test_disabled_job_without_steps_is_valid() {
    let pipeline = Pipeline::new("setup")
        .with_job(Job::new(
            "prepare",
            vec![Task::new("hello", TaskKind::Bash).with_input("command", "echo hello")],
        ))
        .with_job(Job::new("later", Vec::new()).disabled());
    assert!(pipeline.validate().is_ok());

    let enabled = Pipeline::new("setup").with_job(Job::new("later", Vec::new()));
    assert_eq!(
        enabled.validate(),
        Err(ValidationError::EmptyJob {
            job: "later".to_string()
        })
    );
}

#[test]
fn test_pipeline_duplicate_job_names() {
    let step = Task::new("hello", TaskKind::Bash);
    let pipeline = Pipeline::new("setup")
        .with_job(Job::new("prepare", vec![step.clone()]))
        .with_job(Job::new("prepare", vec![step]));

    assert_eq!(
        pipeline.validate(),
        Err(ValidationError::DuplicateName {
            kind: "job",
            name: "prepare".to_string()
        })
    );
}

#[test]
fn test_pipeline_deserialize_yaml() {
    let yaml = r#"
name: bootstrap
tags: [init]
dependsOn: [tools]
jobs:
  - name: clone
    steps:
      - name: fetch api
        kind: git
        inputs:
          repository: https://example.com/org/api.git
      - name: disabled step
        kind: bash
        disabled: true
"#;
    let pipeline: Pipeline = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(pipeline.name, "bootstrap");
    assert_eq!(pipeline.depends_on, vec!["tools".to_string()]);
    assert_eq!(pipeline.jobs[0].steps.len(), 2);
    assert_eq!(pipeline.jobs[0].steps[0].kind, TaskKind::Git);
    assert!(pipeline.jobs[0].steps[1].disabled);
    assert_eq!(pipeline.to_string(), "Pipeline(bootstrap): 1 jobs, 2 steps");
}
