//! Web client manifest task parameters

use crate::tasks::{Expand, TaskParameters};
use crate::vault::{ResolverError, VariableResolver};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output format of the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// Plain JSON document
    Json,
    /// `<variable> = {...};` script
    Javascript,
}

crate::expand_nothing!(ManifestFormat);

/// Parameters of a `webclient-manifest` task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebClientManifestParameters {
    /// File to write
    #[serde(default)]
    pub output_path: String,

    /// Values written to the manifest
    #[serde(default)]
    pub values: Map<String, Value>,

    /// Format; inferred from the output extension when absent
    #[serde(default)]
    pub format: Option<ManifestFormat>,

    /// Global assigned by the JavaScript format
    #[serde(default = "default_variable")]
    pub variable: String,
}

fn default_variable() -> String {
    "window.__env".to_string()
}

impl Expand for WebClientManifestParameters {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        self.output_path.expand(resolver)?;
        self.variable.expand(resolver)?;
        self.values
            .values_mut()
            .try_for_each(|v| v.expand(resolver))
    }
}

impl WebClientManifestParameters {
    /// Effective format
    #[must_use]
    pub fn effective_format(&self) -> ManifestFormat {
        self.format.unwrap_or_else(|| {
            if self.output_path.to_lowercase().ends_with(".json") {
                ManifestFormat::Json
            } else {
                ManifestFormat::Javascript
            }
        })
    }

    /// Renders the manifest body
    ///
    /// # Errors
    ///
    /// Fails when the values cannot be serialized.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string_pretty(&self.values)?;
        Ok(match self.effective_format() {
            ManifestFormat::Json => format!("{json}\n"),
            ManifestFormat::Javascript => format!("{} = {json};\n", self.variable),
        })
    }
}

impl TaskParameters for WebClientManifestParameters {
    fn validate(&self) -> bool {
        !self.output_path.trim().is_empty() && !self.variable.trim().is_empty()
    }

    fn invalid_reason(&self) -> String {
        "outputPath is required".to_string()
    }
}
