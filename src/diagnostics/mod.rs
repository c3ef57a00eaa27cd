//! Structured diagnostics
//!
//! A [`Diagnostics`] value is opened for a named scope (a pipeline run, a
//! job, a worker invocation), accumulates issues while the scope runs and is
//! completed on exit. It outlives the operation so the caller can inspect it.
//! Child scopes are folded into their parent with [`Diagnostics::append`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Severity of a diagnostic issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the enclosing operation
    Error,
    /// Advisory only
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single recorded issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Error or warning
    pub severity: Severity,
    /// Machine readable code
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Component that raised the issue
    pub component: String,
    /// Extra context
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Scope the issue was raised in
    pub scope: String,
    /// Recorded after the scope was completed
    pub late: bool,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.component, self.message
        )?;
        if !self.metadata.is_empty() {
            let context: Vec<String> = self
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " ({})", context.join(", "))?;
        }
        Ok(())
    }
}

/// Accumulated issues of one scope
#[derive(Debug, Clone)]
pub struct Diagnostics {
    scope: String,
    issues: Vec<Issue>,
    started: Instant,
    elapsed: Option<Duration>,
}

impl Diagnostics {
    /// Opens a new scope
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            issues: Vec::new(),
            started: Instant::now(),
            elapsed: None,
        }
    }

    /// Scope name
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Records an error
    pub fn add_error<I, K, V>(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        component: impl Into<String>,
        metadata: I,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push(Severity::Error, code, message, component, metadata);
    }

    /// Records a warning
    pub fn add_warning<I, K, V>(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        component: impl Into<String>,
        metadata: I,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push(Severity::Warning, code, message, component, metadata);
    }

    fn push<I, K, V>(
        &mut self,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        component: impl Into<String>,
        metadata: I,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let issue = Issue {
            severity,
            code: code.into(),
            message: message.into(),
            component: component.into(),
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            scope: self.scope.clone(),
            late: self.is_complete(),
        };
        if issue.late {
            tracing::warn!(scope = %self.scope, code = %issue.code, "Issue recorded after scope completion");
        }
        self.issues.push(issue);
    }

    /// Folds a child scope's issues into this one, preserving order
    pub fn append(&mut self, child: Diagnostics) {
        let late = self.is_complete();
        self.issues.extend(child.issues.into_iter().map(|mut issue| {
            issue.late |= late;
            issue
        }));
    }

    /// Marks the scope complete; only the first call records the elapsed time
    pub fn complete(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(self.started.elapsed());
        }
    }

    /// Whether [`complete`](Self::complete) was called
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.elapsed.is_some()
    }

    /// Elapsed time of a completed scope
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Whether any error was recorded
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Whether any warning was recorded
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    /// All issues in insertion order
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Errors in insertion order
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warnings in insertion order
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Number of errors
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Number of warnings
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// Shorthand for issues without metadata
pub const NO_METADATA: [(&str, &str); 0] = [];
