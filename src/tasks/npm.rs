//! Npm task parameters

use crate::tasks::{TaskParameters, is_set};
use serde::{Deserialize, Serialize};

/// `npm` operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpmCommand {
    /// `npm install`
    Install,
    /// `npm ci`
    Ci,
    /// `npm run <script>`
    Run,
    /// `npm run build`
    Build,
    /// `npm test`
    Test,
    /// `npm publish`
    Publish,
}

crate::expand_nothing!(NpmCommand);

/// Parameters of an `npm` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmParameters {
    /// Operation
    pub command: NpmCommand,

    /// Script name for `run`
    #[serde(default)]
    pub script: Option<String>,

    /// Extra arguments
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Directory holding `package.json`
    #[serde(default)]
    pub working_directory: Option<String>,
}

crate::expand_fields!(NpmParameters {
    script,
    arguments,
    working_directory
});

impl NpmParameters {
    /// Full argument list passed to `npm`
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = match self.command {
            NpmCommand::Install => vec!["install".to_string()],
            NpmCommand::Ci => vec!["ci".to_string()],
            NpmCommand::Run => vec![
                "run".to_string(),
                self.script.clone().unwrap_or_default(),
            ],
            NpmCommand::Build => vec!["run".to_string(), "build".to_string()],
            NpmCommand::Test => vec!["test".to_string()],
            NpmCommand::Publish => vec!["publish".to_string()],
        };
        args.extend(self.arguments.iter().cloned());
        args
    }
}

impl TaskParameters for NpmParameters {
    fn validate(&self) -> bool {
        self.command != NpmCommand::Run || is_set(self.script.as_ref())
    }

    fn invalid_reason(&self) -> String {
        "script is required for 'run'".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_run_script_args() {
        let p: NpmParameters = serde_json::from_value(json!({
            "command": "run",
            "script": "lint",
            "arguments": ["--fix"]
        }))
        .unwrap();
        assert!(p.validate());
        assert_eq!(p.to_args(), vec!["run", "lint", "--fix"]);
    }

    #[test]
    fn test_run_without_script_is_invalid() {
        let p: NpmParameters = serde_json::from_value(json!({ "command": "run" })).unwrap();
        assert!(!p.validate());
    }
}
