//! Typed task parameters
//!
//! Every task kind decodes its untyped `inputs` mapping into a typed record.
//! Decoding goes through serde (so the wire format stays independent of the
//! record), then lets the record normalize itself, then expands every string
//! field through the [`VariableResolver`], and finally checks the record with
//! [`TaskParameters::validate`].

mod bash;
mod credentials;
mod curl;
mod docker;
mod dotnet;
mod ef_migrations;
mod git;
mod keyvault;
mod npm;
mod sql;
mod terraform;
mod webclient;
mod whats_new;

pub use bash::BashParameters;
pub use credentials::{Credentials, redact_url};
pub use curl::{CurlContent, CurlParameters};
pub use docker::{DockerCommand, DockerParameters, RegistryCredentials};
pub use dotnet::{DotnetCommand, DotnetParameters};
pub use ef_migrations::{EfCommand, EfMigrationsParameters};
pub use git::GitParameters;
pub use keyvault::{KeyvaultSyncParameters, partition_for_uri};
pub use npm::{NpmCommand, NpmParameters};
pub use sql::SqlParameters;
pub use terraform::{TerraformCommand, TerraformParameters};
pub use webclient::{ManifestFormat, WebClientManifestParameters};
pub use whats_new::{WhatsNewParameters, parse_notes};

use crate::pipeline::Task;
use crate::vault::{ResolverError, VariableResolver};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while decoding task parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Inputs do not match the parameter record
    #[error("Invalid inputs: {0}")]
    Decode(String),

    /// Placeholder expansion failed
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    /// The decoded record failed validation
    #[error("Invalid parameters: {0}")]
    Invalid(String),
}

/// Placeholder expansion of a value in place
pub trait Expand {
    /// Replaces every placeholder reachable from `self`
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError>;
}

impl Expand for String {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        *self = resolver.replace(self)?;
        Ok(())
    }
}

impl<T: Expand> Expand for Option<T> {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        match self {
            Some(inner) => inner.expand(resolver),
            None => Ok(()),
        }
    }
}

impl<T: Expand> Expand for Vec<T> {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        self.iter_mut().try_for_each(|item| item.expand(resolver))
    }
}

impl<T: Expand> Expand for BTreeMap<String, T> {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        self.values_mut().try_for_each(|item| item.expand(resolver))
    }
}

impl Expand for Value {
    fn expand(&mut self, resolver: &VariableResolver) -> Result<(), ResolverError> {
        match self {
            Value::String(s) => s.expand(resolver),
            Value::Array(items) => items.iter_mut().try_for_each(|v| v.expand(resolver)),
            Value::Object(map) => map.values_mut().try_for_each(|v| v.expand(resolver)),
            _ => Ok(()),
        }
    }
}

crate::expand_nothing!(bool, u16, u32, u64);

/// A typed parameter record of one task kind
pub trait TaskParameters: DeserializeOwned + Expand {
    /// Whether the decoded record is usable
    fn validate(&self) -> bool;

    /// Normalizes the record before expansion
    fn prepare(&mut self) {}

    /// Explains a failed [`validate`](Self::validate)
    fn invalid_reason(&self) -> String {
        "required parameters are missing".to_string()
    }
}

/// Decodes, expands and validates the inputs of `task`
///
/// # Errors
///
/// Returns [`TaskError`] when the inputs do not fit `P`, a placeholder cannot
/// be expanded or the record fails validation.
pub fn decode<P: TaskParameters>(task: &Task, resolver: &VariableResolver) -> Result<P, TaskError> {
    let mut params: P = serde_json::from_value(Value::Object(task.inputs.clone()))
        .map_err(|e| TaskError::Decode(e.to_string()))?;
    params.prepare();
    params.expand(resolver)?;
    if !params.validate() {
        return Err(TaskError::Invalid(params.invalid_reason()));
    }
    Ok(params)
}

/// Whether an optional string is present and not blank
pub(crate) fn is_set(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
