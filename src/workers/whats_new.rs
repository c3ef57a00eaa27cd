//! Release notes worker
//!
//! Posts `{ version, releaseDate, items }` to the notes endpoint. Items come
//! from the task inputs, followed by the lines of the notes file when one is
//! given. Only 2xx answers count as success.

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{WhatsNewParameters, parse_notes};
use crate::workers::curl::{decorate, http_client};
use serde::Serialize;

/// Publishes release notes
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatsNewWorker;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseNotes<'a> {
    version: &'a str,
    release_date: String,
    items: Vec<String>,
}

impl TaskWorker for WhatsNewWorker {
    type Params = WhatsNewParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::WhatsNew
    }

    fn execute(&self, params: &WhatsNewParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let mut items = params.items.clone();
        if let Some(file) = params.notes_file.as_deref().filter(|f| !f.trim().is_empty()) {
            let path = ctx.resolve_path(file);
            match std::fs::read_to_string(&path) {
                Ok(content) => items.extend(parse_notes(&content)),
                Err(e) => {
                    return WorkerResult::errored(
                        codes::NOT_FOUND,
                        format!("cannot read {}: {e}", path.display()),
                    );
                }
            }
        }

        let notes = ReleaseNotes {
            version: &params.version,
            release_date: params
                .release_date
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
            items,
        };

        let client = match http_client() {
            Ok(client) => client,
            Err(result) => return result,
        };
        let request = decorate(
            client.post(&params.url),
            &params.headers,
            params.credentials.as_ref(),
        )
        .json(&notes);

        tracing::debug!(task = %task, version = %params.version, items = notes.items.len(), "Publishing release notes");
        match request.send() {
            Ok(response) if response.status().is_success() => {
                let status = response.status();
                ctx.notifier.success(format!(
                    "Release notes for {} published ({} items)",
                    params.version,
                    notes.items.len()
                ));
                WorkerResult::executed(response.text().unwrap_or_default())
                    .with_status_code(status.as_str())
            }
            Ok(response) => {
                let status = response.status();
                WorkerResult::errored(
                    status.as_str(),
                    format!("{} answered {status}", params.url),
                )
                .with_status_code(status.as_str())
            }
            Err(e) => WorkerResult::errored(codes::CONNECTION_FAILED, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Worker;
    use crate::pipeline::ResultState;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_posts_items_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("NOTES.md");
        std::fs::write(&notes, "- Faster startup\n\n- Dark mode\n").unwrap();
        let (url, server) = testing::serve_once("204 No Content", "");

        let ctx = testing::context();
        let task = Task::new("notes", TaskKind::WhatsNew).with_inputs(crate::inputs! {
            "url" => url,
            "version" => "1.4.0",
            "releaseDate" => "2026-10-01",
            "items" => ["Bug fixes"],
            "notesFile" => notes.to_str().unwrap(),
        });
        let result = WhatsNewWorker.run(&task, &ctx);
        let request = server.join().unwrap();

        assert_eq!(result.state, ResultState::Executed);
        assert_eq!(result.status_code, "204");
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({
                "version": "1.4.0",
                "releaseDate": "2026-10-01",
                "items": ["Bug fixes", "Faster startup", "Dark mode"]
            })
        );
    }

    #[test]
    fn test_error_status_fails() {
        let (url, server) = testing::serve_once("500 Internal Server Error", "boom");
        let ctx = testing::context();
        let task = Task::new("notes", TaskKind::WhatsNew).with_inputs(crate::inputs! {
            "url" => url,
            "version" => "1.4.0",
            "items" => ["x"],
        });
        let result = WhatsNewWorker.run(&task, &ctx);
        server.join().unwrap();
        assert_eq!(result.error_code, "500");
    }
}
