//! Configuration management
//!
//! Two layers of configuration exist:
//!
//! - `config.yml` in the locally home directory (`$LOCALLY_HOME`, else
//!   `~/.locally`) registers contexts and remembers the current one
//! - a context file describes one environment: variables, pipelines, docker
//!   services and terraform stacks
//!
//! Loading a context resolves the `dependsOn` declarations of its services,
//! components, stacks and pipelines, so a context that loads is known to be
//! free of unknown names and cycles.

use crate::dependency::{self, Dependable, DependencyError};
use crate::pipeline::Pipeline;
use crate::tasks::RegistryCredentials;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "LOCALLY_HOME";

/// Directory name under the user's home
pub const HOME_DIR: &str = ".locally";

/// Global configuration file name
pub const CONFIG_FILE: &str = "config.yml";

/// Cache directory name inside the home directory
pub const CACHE_DIR: &str = "cache";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home directory could be determined
    #[error("Cannot determine the home directory; set {HOME_ENV}")]
    NoHome,

    /// A file could not be read or written
    #[error("Cannot access '{path}': {message}")]
    Io {
        /// File path
        path: String,
        /// Failure description
        message: String,
    },

    /// A file is not valid YAML for its schema
    #[error("Cannot parse '{path}': {message}")]
    Parse {
        /// File path
        path: String,
        /// Failure description
        message: String,
    },

    /// No current context is set
    #[error("No current context; run `locally config set-context <name>`")]
    NoCurrentContext,

    /// The named context is not registered and is not a file
    #[error("Unknown context '{0}'")]
    UnknownContext(String),

    /// Dependencies in the context file are inconsistent
    #[error("Invalid dependencies in {scope}: {source}")]
    Dependency {
        /// What was being resolved
        scope: String,
        /// Resolver failure
        #[source]
        source: DependencyError,
    },
}

fn io_error(path: &Path, err: &std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Resolves the locally home directory
///
/// # Errors
///
/// Fails when neither `$LOCALLY_HOME` nor the user home is available.
pub fn locally_home() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(HOME_DIR))
        .ok_or(ConfigError::NoHome)
}

/// A registered context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    /// Context name
    pub name: String,
    /// Path of the context file
    pub path: PathBuf,
}

/// Contents of `config.yml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Name of the current context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Registered contexts
    #[serde(default)]
    pub contexts: Vec<ContextRef>,

    /// Default log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl GlobalConfig {
    /// Loads `config.yml` from `home`; a missing file is an empty config
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| io_error(&path, &e))?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Writes `config.yml` into `home`
    ///
    /// # Errors
    ///
    /// Fails when the directory or file cannot be written.
    pub fn save(&self, home: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(home).map_err(|e| io_error(home, &e))?;
        let path = home.join(CONFIG_FILE);
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&path, content).map_err(|e| io_error(&path, &e))
    }

    /// Registered context by name
    #[must_use]
    pub fn context(&self, name: &str) -> Option<&ContextRef> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// The current context, if set and registered
    #[must_use]
    pub fn current(&self) -> Option<&ContextRef> {
        self.context(self.current_context.as_deref()?)
    }

    /// Registers or updates a context
    pub fn register(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        let path = path.into();
        match self.contexts.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.path = path,
            None => self.contexts.push(ContextRef { name, path }),
        }
    }

    /// Makes `name_or_path` the current context
    ///
    /// A registered name is selected directly. Otherwise the argument is
    /// read as a context file, registered under its own name and selected.
    ///
    /// # Errors
    ///
    /// Fails when the argument is neither a registered name nor a loadable
    /// context file.
    pub fn set_current(&mut self, name_or_path: &str) -> Result<String, ConfigError> {
        if self.context(name_or_path).is_some() {
            self.current_context = Some(name_or_path.to_string());
            return Ok(name_or_path.to_string());
        }
        let path = Path::new(name_or_path);
        if !path.is_file() {
            return Err(ConfigError::UnknownContext(name_or_path.to_string()));
        }
        let context = ContextConfig::load(path)?;
        let absolute = fs::canonicalize(path).map_err(|e| io_error(path, &e))?;
        self.register(context.name.clone(), absolute);
        self.current_context = Some(context.name.clone());
        Ok(context.name)
    }

    /// Loads the current context file
    ///
    /// # Errors
    ///
    /// Fails when no current context is set or the file cannot be loaded.
    pub fn load_current(&self) -> Result<ContextConfig, ConfigError> {
        let current = self.current().ok_or(ConfigError::NoCurrentContext)?;
        ContextConfig::load(&current.path)
    }
}

/// Image build settings of a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Build context directory
    #[serde(default = "default_build_context")]
    pub context: String,
    /// Dockerfile path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

fn default_build_context() -> String {
    ".".to_string()
}

/// A container of a docker service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name, also the container name suffix
    pub name: String,
    /// Image reference
    #[serde(default)]
    pub image: String,
    /// Build settings; the image is pulled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    /// Published ports, `host:container`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Container environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Command override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Components of the same service started first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Components depending on this one
    #[serde(skip)]
    pub required_by: Vec<String>,
}

/// A docker service: a group of components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service name
    pub name: String,
    /// Base directory for build contexts, relative to the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Registry login used before pulling or pushing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryCredentials>,
    /// Components in declaration order
    #[serde(default)]
    pub components: Vec<Component>,
    /// Services started first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Services depending on this one
    #[serde(skip)]
    pub required_by: Vec<String>,
}

impl Service {
    /// Component by name
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// A terraform stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// Stack name
    pub name: String,
    /// Module directory, relative to the workspace
    #[serde(default)]
    pub path: String,
    /// `-var` values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    /// Stacks applied first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Stacks depending on this one
    #[serde(skip)]
    pub required_by: Vec<String>,
}

/// A Key Vault synced by `locally keyvault sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyvaultRef {
    /// Vault URI
    pub uri: String,
    /// Partition override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}

macro_rules! dependable {
    ($($ty:ty),*) => {
        $(
            impl Dependable for $ty {
                fn name(&self) -> &str {
                    &self.name
                }

                fn depends_on(&self) -> &[String] {
                    &self.depends_on
                }

                fn set_required_by(&mut self, required_by: Vec<String>) {
                    self.required_by = required_by;
                }
            }
        )*
    };
}

dependable!(Component, Service, Stack);

/// A context file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    /// Context name
    pub name: String,

    /// Base directory for clones and relative paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Values exposed through the `config` vault
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Pipelines
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,

    /// Docker services
    #[serde(default)]
    pub services: Vec<Service>,

    /// Terraform stacks
    #[serde(default)]
    pub infrastructure: Vec<Stack>,

    /// Key Vaults
    #[serde(default)]
    pub keyvaults: Vec<KeyvaultRef>,

    /// Directory of the context file
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ContextConfig {
    /// Reads and validates a context file
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not a valid context or
    /// declares inconsistent dependencies.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
        let mut context = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        context.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(context = %context.name, path = %path.display(), "Context loaded");
        Ok(context)
    }

    /// Parses and validates a context from YAML
    ///
    /// # Errors
    ///
    /// Fails on invalid YAML or inconsistent dependencies.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let context: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        context.resolved()
    }

    fn resolved(mut self) -> Result<Self, ConfigError> {
        let wrap = |scope: String| move |source| ConfigError::Dependency { scope, source };

        let mut services = dependency::resolve(std::mem::take(&mut self.services))
            .map_err(wrap("services".to_string()))?;
        for service in &mut services {
            service.components = dependency::resolve(std::mem::take(&mut service.components))
                .map_err(wrap(format!("service '{}'", service.name)))?;
        }
        self.services = services;
        self.infrastructure = dependency::resolve(std::mem::take(&mut self.infrastructure))
            .map_err(wrap("infrastructure".to_string()))?;
        self.pipelines = dependency::resolve(std::mem::take(&mut self.pipelines))
            .map_err(wrap("pipelines".to_string()))?;
        Ok(self)
    }

    /// Workspace directory
    #[must_use]
    pub fn workspace_dir(&self) -> PathBuf {
        match &self.workspace {
            Some(ws) if ws.is_absolute() => ws.clone(),
            Some(ws) => self.base_dir.join(ws),
            None => self.base_dir.clone(),
        }
    }

    /// Pipeline by name
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Service by name
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Stack by name
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.infrastructure.iter().find(|s| s.name == name)
    }

    /// Directory of a stack
    #[must_use]
    pub fn stack_dir(&self, stack: &Stack) -> PathBuf {
        let path = if stack.path.is_empty() {
            stack.name.as_str()
        } else {
            stack.path.as_str()
        };
        self.workspace_dir().join(path)
    }
}

/// Removes the cache directory; `all` also forgets registered contexts
///
/// # Errors
///
/// Fails when files cannot be removed or `config.yml` cannot be written.
pub fn clean(home: &Path, all: bool) -> Result<(), ConfigError> {
    let cache = home.join(CACHE_DIR);
    if cache.exists() {
        fs::remove_dir_all(&cache).map_err(|e| io_error(&cache, &e))?;
    }
    if all {
        GlobalConfig::default().save(home)?;
    }
    Ok(())
}
