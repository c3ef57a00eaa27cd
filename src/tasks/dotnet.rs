//! Dotnet task parameters

use crate::tasks::TaskParameters;
use serde::{Deserialize, Serialize};

/// `dotnet` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotnetCommand {
    /// `dotnet build`
    Build,
    /// `dotnet restore`
    Restore,
    /// `dotnet test`
    Test,
    /// `dotnet publish`
    Publish,
    /// `dotnet run`
    Run,
    /// `dotnet pack`
    Pack,
    /// `dotnet clean`
    Clean,
}

crate::expand_nothing!(DotnetCommand);

impl DotnetCommand {
    /// Subcommand name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Restore => "restore",
            Self::Test => "test",
            Self::Publish => "publish",
            Self::Run => "run",
            Self::Pack => "pack",
            Self::Clean => "clean",
        }
    }
}

/// Parameters of a `dotnet` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DotnetParameters {
    /// Subcommand
    pub command: DotnetCommand,

    /// Project or solution file
    #[serde(default)]
    pub project_path: Option<String>,

    /// Build configuration, e.g. `Release`
    #[serde(default)]
    pub configuration: Option<String>,

    /// Extra arguments
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Directory the tool runs in
    #[serde(default)]
    pub working_directory: Option<String>,
}

crate::expand_fields!(DotnetParameters {
    project_path,
    configuration,
    arguments,
    working_directory
});

impl DotnetParameters {
    /// Full argument list passed to `dotnet`
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.command.as_str().to_string()];
        if let Some(project) = self.project_path.as_ref().filter(|p| !p.is_empty()) {
            args.push(project.clone());
        }
        if let Some(configuration) = self.configuration.as_ref().filter(|c| !c.is_empty()) {
            args.push("--configuration".to_string());
            args.push(configuration.clone());
        }
        args.extend(self.arguments.iter().cloned());
        args
    }
}

impl TaskParameters for DotnetParameters {
    fn validate(&self) -> bool {
        true
    }
}
