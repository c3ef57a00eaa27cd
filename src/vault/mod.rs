//! Vaults and the variable resolver
//!
//! A vault is a named, refreshable provider of key/value pairs. The
//! [`VariableResolver`] keeps the latest snapshot of every registered vault
//! and substitutes `${{ <vault>.<key> }}` placeholders in task inputs.
//!
//! ```rust
//! use locally::vault::{MemoryVault, VariableResolver};
//!
//! let resolver = VariableResolver::new();
//! resolver
//!     .register(MemoryVault::new("env").with_value("name", "world"))
//!     .unwrap();
//! assert_eq!(resolver.replace("hi ${{ env.name }}").unwrap(), "hi world");
//! ```

pub mod placeholder;
pub mod resolver;

pub use resolver::{DEFAULT_EXPANSION_BUDGET, VariableResolver};

use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the process environment vault
pub const ENV_VAULT: &str = "env";
/// Name of the context variables vault
pub const CONFIG_VAULT: &str = "config";
/// Name of the vault Key Vault secrets are written to
pub const KEYVAULT_VAULT: &str = "keyvault";
/// Name of the vault terraform outputs are written to
pub const INFRASTRUCTURE_VAULT: &str = "infrastructure";

/// Errors raised while resolving variables
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The same `(vault, key)` was reached twice on one expansion path
    #[error("Placeholder cycle detected on {vault}.{key}")]
    Cycle {
        /// Vault name
        vault: String,
        /// Key
        key: String,
    },

    /// Too many substitutions in a single call
    #[error("Expansion budget of {budget} substitutions exhausted")]
    ExpansionBudget {
        /// Budget that ran out
        budget: u32,
    },

    /// A vault failed to refresh
    #[error("Vault '{vault}' failed to sync: {message}")]
    VaultSync {
        /// Vault name
        vault: String,
        /// Failure description
        message: String,
    },
}

/// A named provider of key/value pairs
pub trait Vault: Send + Sync {
    /// Vault name used as placeholder prefix
    fn name(&self) -> &str;

    /// Sub-namespace the entries are stored under, if any
    fn partition(&self) -> Option<&str> {
        None
    }

    /// Fetches the current entries; values may be nested mappings
    fn sync(&self) -> Result<Map<String, Value>, ResolverError>;
}

/// Flattens nested values into lower-cased dotted keys
///
/// Strings are kept as is, `null` becomes an empty string and every other
/// scalar or sequence is rendered with its JSON text.
#[must_use]
pub fn flatten(entries: &Map<String, Value>) -> Vec<(String, String)> {
    let mut flat = Vec::new();
    flatten_into("", entries, &mut flat);
    flat
}

fn flatten_into(prefix: &str, entries: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in entries {
        let key = if prefix.is_empty() {
            key.to_lowercase()
        } else {
            format!("{prefix}.{}", key.to_lowercase())
        };
        match value {
            Value::Object(nested) => flatten_into(&key, nested, out),
            Value::String(s) => out.push((key, s.clone())),
            Value::Null => out.push((key, String::new())),
            other => out.push((key, other.to_string())),
        }
    }
}

/// Vault over a fixed in-memory mapping
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    name: String,
    partition: Option<String>,
    entries: Map<String, Value>,
}

impl MemoryVault {
    /// Creates an empty vault
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition: None,
            entries: Map::new(),
        }
    }

    /// Adds an entry
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Stores entries under a partition
    #[must_use]
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }
}

impl Vault for MemoryVault {
    fn name(&self) -> &str {
        &self.name
    }

    fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    fn sync(&self) -> Result<Map<String, Value>, ResolverError> {
        Ok(self.entries.clone())
    }
}

/// Process environment, exposed as the `env` vault
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVault;

impl Vault for EnvironmentVault {
    fn name(&self) -> &str {
        ENV_VAULT
    }

    fn sync(&self) -> Result<Map<String, Value>, ResolverError> {
        Ok(std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

/// Context `variables`, exposed as the `config` vault
#[derive(Debug, Clone, Default)]
pub struct ConfigVault {
    variables: Map<String, Value>,
}

impl ConfigVault {
    /// Wraps the variables of a context file
    #[must_use]
    pub fn new(variables: Map<String, Value>) -> Self {
        Self { variables }
    }
}

impl Vault for ConfigVault {
    fn name(&self) -> &str {
        CONFIG_VAULT
    }

    fn sync(&self) -> Result<Map<String, Value>, ResolverError> {
        Ok(self.variables.clone())
    }
}
