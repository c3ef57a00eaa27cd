//! Terraform task parameters

use crate::tasks::TaskParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terraform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerraformCommand {
    /// `terraform init`
    Init,
    /// `terraform validate -json`
    Validate,
    /// `terraform plan -out`
    Plan,
    /// `terraform apply` of the saved plan
    Apply,
    /// `terraform destroy`
    Destroy,
    /// `terraform output -json`
    Output,
    /// `terraform graph`
    Graph,
    /// `terraform refresh`
    Refresh,
}

crate::expand_nothing!(TerraformCommand);

impl TerraformCommand {
    /// Terraform subcommand name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
            Self::Graph => "graph",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TerraformCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an `infrastructure` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformParameters {
    /// Operation
    pub command: TerraformCommand,

    /// Stack from the context file
    #[serde(default, alias = "stack")]
    pub stack_name: String,

    /// Run the command on the stack's dependencies first
    #[serde(default)]
    pub build_dependencies: bool,

    /// `-var` values
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

crate::expand_fields!(TerraformParameters {
    stack_name,
    variables
});

impl TaskParameters for TerraformParameters {
    fn validate(&self) -> bool {
        !self.stack_name.trim().is_empty()
    }

    fn invalid_reason(&self) -> String {
        "stackName is required".to_string()
    }
}
