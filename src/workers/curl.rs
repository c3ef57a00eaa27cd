//! Curl worker
//!
//! Issues one HTTP request. Statuses from 200 to 399 count as success; any
//! other status fails the task with the status as its error code, and a
//! transport failure fails it with `503`.

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{Credentials, CurlParameters};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use std::collections::BTreeMap;

/// Issues HTTP requests
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlWorker;

/// Blocking HTTP client shared by the HTTP workers
pub(crate) fn http_client() -> Result<Client, WorkerResult> {
    Client::builder()
        .user_agent(concat!("locally/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| WorkerResult::errored(codes::CONNECTION_FAILED, e.to_string()))
}

/// Adds headers and credentials to a request
pub(crate) fn decorate(
    mut request: RequestBuilder,
    headers: &BTreeMap<String, String>,
    credentials: Option<&Credentials>,
) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if let Some(credentials) = credentials {
        if let Some(token) = credentials.bearer() {
            request = request.bearer_auth(token);
        } else if let Some((username, password)) = credentials.basic() {
            request = request.basic_auth(username, password);
        }
    }
    request
}

impl TaskWorker for CurlWorker {
    type Params = CurlParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Curl
    }

    fn execute(&self, params: &CurlParameters, task: &Task, _ctx: &WorkerContext) -> WorkerResult {
        let client = match http_client() {
            Ok(client) => client,
            Err(result) => return result,
        };
        let Ok(method) = Method::from_bytes(params.verb.as_bytes()) else {
            return WorkerResult::errored(
                codes::INVALID_PARAMETERS,
                format!("unsupported verb '{}'", params.verb),
            );
        };

        let url = params.url();
        let mut request = decorate(
            client.request(method, &url),
            &params.headers,
            params.credentials.as_ref(),
        );
        if let Some(content) = &params.content {
            if let Some(json) = &content.json {
                request = request.json(json);
            } else if let Some(form) = &content.url_encoded {
                request = request.form(form);
            }
        }

        tracing::debug!(task = %task, verb = %params.verb, url = %url, "Sending request");
        let response = match request.send() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(task = %task, url = %url, error = %e, "Request failed");
                return WorkerResult::errored(codes::CONNECTION_FAILED, e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if (200..400).contains(&status.as_u16()) {
            WorkerResult::executed(body).with_status_code(status.as_str())
        } else {
            WorkerResult::errored(
                status.as_str(),
                format!("{} {url} answered {status}", params.verb),
            )
            .with_status_code(status.as_str())
            .with_output(body)
        }
    }
}
