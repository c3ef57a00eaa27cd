//! Entity Framework migration task parameters

use crate::tasks::{TaskParameters, is_set};
use serde::{Deserialize, Serialize};

/// `dotnet ef` migration operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfCommand {
    /// `dotnet ef database update`
    Update,
    /// `dotnet ef migrations add`
    Add,
    /// `dotnet ef migrations remove`
    Remove,
    /// `dotnet ef migrations list`
    List,
    /// `dotnet ef migrations script`
    Script,
}

crate::expand_nothing!(EfCommand);

/// Parameters of an `ef-migrations` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfMigrationsParameters {
    /// Operation
    pub command: EfCommand,

    /// Project holding the migrations
    #[serde(default)]
    pub project_path: Option<String>,

    /// Startup project
    #[serde(default)]
    pub startup_project: Option<String>,

    /// DbContext class
    #[serde(default)]
    pub context: Option<String>,

    /// Migration name, required by `add`
    #[serde(default)]
    pub migration_name: Option<String>,

    /// Connection string passed with `--connection`
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Directory the tool runs in
    #[serde(default)]
    pub working_directory: Option<String>,
}

crate::expand_fields!(EfMigrationsParameters {
    project_path,
    startup_project,
    context,
    migration_name,
    connection_string,
    working_directory
});

impl EfMigrationsParameters {
    /// Full argument list passed to `dotnet`
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = match self.command {
            EfCommand::Update => vec!["ef", "database", "update"],
            EfCommand::Add => vec!["ef", "migrations", "add"],
            EfCommand::Remove => vec!["ef", "migrations", "remove"],
            EfCommand::List => vec!["ef", "migrations", "list"],
            EfCommand::Script => vec!["ef", "migrations", "script"],
        }
        .into_iter()
        .map(str::to_string)
        .collect();

        if let Some(name) = self.migration_name.as_ref().filter(|_| self.command == EfCommand::Add) {
            args.push(name.clone());
        }
        let options = [
            ("--project", &self.project_path),
            ("--startup-project", &self.startup_project),
            ("--context", &self.context),
            ("--connection", &self.connection_string),
        ];
        for (flag, value) in options {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                if flag == "--connection"
                    && !matches!(self.command, EfCommand::Update | EfCommand::List)
                {
                    continue;
                }
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }
}

impl TaskParameters for EfMigrationsParameters {
    fn validate(&self) -> bool {
        self.command != EfCommand::Add || is_set(self.migration_name.as_ref())
    }

    fn invalid_reason(&self) -> String {
        "migrationName is required to add a migration".to_string()
    }
}
