//! Git task parameters

use crate::tasks::{Credentials, TaskParameters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters of a `git` task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitParameters {
    /// Repository URL
    #[serde(default, alias = "url")]
    pub repository: String,

    /// Checkout directory; computed from the repository name when empty
    #[serde(default)]
    pub destination: Option<String>,

    /// Branch to check out
    #[serde(default)]
    pub branch: Option<String>,

    /// Remove the destination before cloning
    #[serde(default)]
    pub clean: bool,

    /// HTTPS credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

crate::expand_fields!(GitParameters {
    repository,
    destination,
    branch,
    credentials
});

impl GitParameters {
    /// Repository name: last path segment without `.git`
    #[must_use]
    pub fn repository_name(&self) -> String {
        self.repository
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()
            .unwrap_or_default()
            .trim_end_matches(".git")
            .to_string()
    }

    /// Checkout directory, relative paths resolved against `workspace`
    #[must_use]
    pub fn destination_in(&self, workspace: &Path) -> PathBuf {
        match self.destination.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(dest) => workspace.join(dest),
            None => workspace.join(self.repository_name()),
        }
    }
}

impl TaskParameters for GitParameters {
    fn validate(&self) -> bool {
        !self.repository.trim().is_empty() && !self.repository_name().is_empty()
    }

    fn invalid_reason(&self) -> String {
        "repository is required".to_string()
    }
}
