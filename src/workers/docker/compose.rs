//! Compose file generation

use crate::infrastructure::{Component, Service};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label carrying the service name on every container
pub const SERVICE_LABEL: &str = "locally.service";

/// Label carrying the component name on every container
pub const COMPONENT_LABEL: &str = "locally.component";

/// Compose file name inside the service directory
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// A `docker-compose.yml` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Services keyed by component name
    pub services: BTreeMap<String, ComposeService>,
}

/// Build section of a compose service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeBuild {
    /// Build context, relative to the compose file
    pub context: String,
    /// Dockerfile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// One compose service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeService {
    /// Image reference
    pub image: String,
    /// Build section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ComposeBuild>,
    /// Container name
    pub container_name: String,
    /// Command override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Published ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Services started first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Ownership labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Container name of a component
#[must_use]
pub fn container_name(service: &Service, component: &Component) -> String {
    format!("{}-{}", service.name, component.name)
}

/// Image of a component; built components without an image get a local tag
#[must_use]
pub fn image_of(service: &Service, component: &Component) -> String {
    if component.image.trim().is_empty() {
        format!("{}:local", container_name(service, component))
    } else {
        component.image.clone()
    }
}

/// Ownership labels of a component's container
#[must_use]
pub fn labels(service: &Service, component: &Component) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SERVICE_LABEL.to_string(), service.name.clone()),
        (COMPONENT_LABEL.to_string(), component.name.clone()),
    ])
}

impl ComposeFile {
    /// Compose document of a service
    #[must_use]
    pub fn for_service(service: &Service) -> Self {
        let services = service
            .components
            .iter()
            .map(|component| {
                let build = component.build.as_ref().map(|b| ComposeBuild {
                    context: b.context.clone(),
                    dockerfile: b.dockerfile.clone(),
                    args: b.args.clone(),
                });
                let entry = ComposeService {
                    image: image_of(service, component),
                    build,
                    container_name: container_name(service, component),
                    command: component.command.clone(),
                    ports: component.ports.clone(),
                    environment: component.environment.clone(),
                    volumes: component.volumes.clone(),
                    depends_on: component.depends_on.clone(),
                    labels: labels(service, component),
                };
                (component.name.clone(), entry)
            })
            .collect();
        Self { services }
    }

    /// YAML text of the document
    ///
    /// # Errors
    ///
    /// Fails when serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
