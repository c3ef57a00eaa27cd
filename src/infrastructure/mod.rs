//! Infrastructure layer
//!
//! Configuration files, logging, Azure collaborators and the admin HTTP
//! surface.

pub mod api;
pub mod azure;
pub mod config;
mod logging;

pub use azure::{
    AcrCredentials, AzureError, AzureKeyVaultFactory, KeyVaultClient, SecretProvider,
    SecretProviderFactory, ServicePrincipal, TokenCache, acr_cache_key, acr_login,
};
pub use config::{
    BuildSpec, Component, ConfigError, ContextConfig, ContextRef, GlobalConfig, KeyvaultRef,
    Service, Stack, locally_home,
};
pub use logging::{DEFAULT_LEVEL, init_logging, level_for};
