//! Docker task parameters

use crate::tasks::TaskParameters;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Docker operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DockerCommand {
    /// Build images
    Build,
    /// Remove then build images
    Rebuild,
    /// Run a one-off container
    Run,
    /// Create and start containers
    Up,
    /// Stop and remove containers
    Down,
    /// Start stopped containers
    Start,
    /// Stop containers
    Stop,
    /// Pause containers
    Pause,
    /// Unpause containers
    Resume,
    /// Show container state
    Status,
    /// List services and components
    List,
    /// Show container logs
    Logs,
    /// Remove containers and images
    Delete,
    /// Pull images
    Pull,
    /// Write a compose file for a service
    GenerateCompose,
}

crate::expand_nothing!(DockerCommand);

impl fmt::Display for DockerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        f.write_str(&token)
    }
}

impl DockerCommand {
    /// Whether the command needs a service name
    #[must_use]
    pub fn needs_service(self) -> bool {
        !matches!(self, DockerCommand::List | DockerCommand::Status)
    }
}

/// Registry login details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    /// Registry host, e.g. `ghcr.io`
    #[serde(default)]
    pub registry: Option<String>,
    /// User name
    #[serde(default)]
    pub username: Option<String>,
    /// Password or token
    #[serde(default)]
    pub password: Option<String>,
    /// Azure Container Registry name; logs in through the Azure CLI
    #[serde(default)]
    pub acr: Option<String>,
}

crate::expand_fields!(RegistryCredentials {
    registry,
    username,
    password,
    acr
});

/// Parameters of a `docker` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerParameters {
    /// Operation
    pub command: DockerCommand,

    /// Service from the context file
    #[serde(default)]
    pub service: Option<String>,

    /// Component of the service; all components when empty
    #[serde(default)]
    pub component: Option<String>,

    /// Include the component's dependencies
    #[serde(default)]
    pub build_dependencies: bool,

    /// Registry credentials forwarded to `docker login`
    #[serde(default)]
    pub credentials: Option<RegistryCredentials>,
}

crate::expand_fields!(DockerParameters {
    service,
    component,
    credentials
});

impl TaskParameters for DockerParameters {
    fn validate(&self) -> bool {
        !self.command.needs_service() || super::is_set(self.service.as_ref())
    }

    fn invalid_reason(&self) -> String {
        format!("service is required for '{}'", self.command)
    }
}
