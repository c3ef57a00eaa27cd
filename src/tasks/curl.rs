//! Curl task parameters

use crate::tasks::{Credentials, TaskParameters};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const VERBS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Request body; `json` wins when both are given
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurlContent {
    /// JSON body
    #[serde(default)]
    pub json: Option<Value>,
    /// Form body, sent as `application/x-www-form-urlencoded`
    #[serde(default)]
    pub url_encoded: Option<BTreeMap<String, String>>,
}

crate::expand_fields!(CurlContent { json, url_encoded });

/// Parameters of a `curl` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurlParameters {
    /// HTTP method
    #[serde(default = "default_verb")]
    pub verb: String,

    /// Base URL
    #[serde(default)]
    pub host: String,

    /// Path appended to `host`
    #[serde(default)]
    pub path: Option<String>,

    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body
    #[serde(default)]
    pub content: Option<CurlContent>,

    /// Basic or bearer credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_verb() -> String {
    "GET".to_string()
}

crate::expand_fields!(CurlParameters {
    verb,
    host,
    path,
    headers,
    content,
    credentials
});

impl CurlParameters {
    /// Target URL
    #[must_use]
    pub fn url(&self) -> String {
        match self.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => format!(
                "{}/{}",
                self.host.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => self.host.clone(),
        }
    }
}

impl TaskParameters for CurlParameters {
    fn validate(&self) -> bool {
        !self.host.trim().is_empty() && VERBS.contains(&self.verb.as_str())
    }

    fn prepare(&mut self) {
        self.verb = self.verb.trim().to_uppercase();
    }

    fn invalid_reason(&self) -> String {
        if self.host.trim().is_empty() {
            "host is required".to_string()
        } else {
            format!("unsupported verb '{}'", self.verb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(value: Value) -> CurlParameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_to_get() {
        let p = params(json!({ "host": "http://localhost:9/no" }));
        assert_eq!(p.verb, "GET");
        assert!(p.validate());
    }

    #[test]
    fn test_url_joins_path() {
        let p = params(json!({ "host": "http://api/", "path": "/health" }));
        assert_eq!(p.url(), "http://api/health");
    }

    #[test]
    fn test_unknown_verb_is_invalid() {
        let mut p = params(json!({ "host": "http://api", "verb": "fetch" }));
        p.prepare();
        assert!(!p.validate());
        assert!(p.invalid_reason().contains("FETCH"));
    }
}
