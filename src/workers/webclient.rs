//! Web client manifest worker

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::WebClientManifestParameters;
use std::fs;

/// Writes environment manifests for browser clients
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClientManifestWorker;

impl TaskWorker for WebClientManifestWorker {
    type Params = WebClientManifestParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::WebClientManifest
    }

    fn execute(
        &self,
        params: &WebClientManifestParameters,
        task: &Task,
        ctx: &WorkerContext,
    ) -> WorkerResult {
        let body = match params.render() {
            Ok(body) => body,
            Err(e) => return WorkerResult::errored(codes::EXECUTION_FAILED, e.to_string()),
        };
        let path = ctx.resolve_path(&params.output_path);
        let written = match path.parent() {
            Some(parent) => fs::create_dir_all(parent).and_then(|()| fs::write(&path, &body)),
            None => fs::write(&path, &body),
        };
        if let Err(e) = written {
            return WorkerResult::errored(
                codes::EXECUTION_FAILED,
                format!("cannot write {}: {e}", path.display()),
            );
        }

        tracing::debug!(task = %task, path = %path.display(), keys = params.values.len(), "Manifest written");
        ctx.notifier
            .success(format!("Manifest written to {}", path.display()));
        WorkerResult::executed(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Worker;
    use crate::vault::MemoryVault;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_writes_expanded_json() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context();
        ctx.resolver
            .register(MemoryVault::new("config").with_value("api", "http://localhost:5000"))
            .unwrap();
        let path = dir.path().join("public").join("env.json");
        let task = Task::new("env", TaskKind::WebClientManifest).with_inputs(crate::inputs! {
            "outputPath" => path.to_str().unwrap(),
            "values" => json!({ "apiUrl": "${{ config.api }}" }),
        });

        let result = WebClientManifestWorker.run(&task, &ctx);
        assert!(result.state.is_executed(), "{result}");
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({ "apiUrl": "http://localhost:5000" }));
    }
}
