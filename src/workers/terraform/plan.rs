//! Plan and validation documents
//!
//! Summaries of `terraform show -json` and `terraform validate -json`.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Action counts of one change category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    /// Objects to create
    pub create: usize,
    /// Objects to update in place
    pub change: usize,
    /// Objects to delete
    pub delete: usize,
    /// Objects left untouched
    pub no_op: usize,
}

impl ChangeCounts {
    fn record(&mut self, actions: &[String]) {
        let has = |action: &str| actions.iter().any(|a| a == action);
        if has("create") {
            self.create += 1;
        }
        if has("delete") {
            self.delete += 1;
        }
        if has("update") {
            self.change += 1;
        }
        if has("no-op") || has("read") {
            self.no_op += 1;
        }
    }

    /// Whether anything would change
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.create + self.change + self.delete > 0
    }
}

/// Change summary of a saved plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Resource changes
    pub resources: ChangeCounts,
    /// Output changes
    pub outputs: ChangeCounts,
}

#[derive(Deserialize)]
struct Change {
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Deserialize)]
struct ResourceChange {
    change: Change,
}

#[derive(Deserialize)]
struct PlanDocument {
    #[serde(default)]
    resource_changes: Vec<ResourceChange>,
    #[serde(default)]
    output_changes: Map<String, Value>,
}

impl PlanSummary {
    /// Summarizes the JSON printed by `terraform show -json <plan>`
    ///
    /// # Errors
    ///
    /// Fails when `json` is not a plan document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: PlanDocument = serde_json::from_str(json)?;
        let mut summary = Self::default();
        for resource in &document.resource_changes {
            summary.resources.record(&resource.change.actions);
        }
        for change in document.output_changes.into_values() {
            let change: Change = serde_json::from_value(change)?;
            summary.outputs.record(&change.actions);
        }
        Ok(summary)
    }

    /// Whether neither resources nor outputs would change
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        !self.resources.has_changes() && !self.outputs.has_changes()
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_up_to_date() {
            return f.write_str("up to date");
        }
        let r = &self.resources;
        write!(
            f,
            "{} to add, {} to change, {} to destroy, {} unchanged",
            r.create, r.change, r.delete, r.no_op
        )?;
        if self.outputs.has_changes() {
            let o = &self.outputs;
            write!(
                f,
                "; outputs: {} to add, {} to change, {} to remove",
                o.create, o.change, o.delete
            )?;
        }
        Ok(())
    }
}

/// One diagnostic of `terraform validate -json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationDiagnostic {
    /// `error` or `warning`
    pub severity: String,
    /// Short description
    pub summary: String,
    /// Long description
    #[serde(default)]
    pub detail: String,
}

/// Document printed by `terraform validate -json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationReport {
    /// Whether the configuration is valid
    pub valid: bool,
    /// Diagnostics in output order
    #[serde(default)]
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Parses the validation document
    ///
    /// # Errors
    ///
    /// Fails when `json` is not a validation document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
