//! Azure collaborators
//!
//! - [`TokenCache`]: process-scoped cache for Azure Container Registry
//!   refresh tokens, valid until their JWT `exp` minus 60 seconds
//! - [`acr_login`]: obtains a registry token through `az acr login --expose-token`
//! - [`KeyVaultClient`]: lists secrets of a Key Vault over its REST API with
//!   an OAuth2 client-credentials token

use crate::executor::{ProcessCommand, ProcessError};
use crate::tasks::KeyvaultSyncParameters;
use ahash::AHashMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Timeout of every Azure HTTP call
pub const AZURE_TIMEOUT: Duration = Duration::from_secs(300);

/// Seconds subtracted from a token's `exp` before it is considered stale
pub const EXPIRY_MARGIN_SECS: i64 = 60;

const KEYVAULT_API_VERSION: &str = "7.4";
const KEYVAULT_SCOPE: &str = "https://vault.azure.net/.default";
const ACR_TOKEN_USER: &str = "00000000-0000-0000-0000-000000000000";

/// Azure errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AzureError {
    /// Service principal settings are missing
    #[error("Missing Azure credential: {0}")]
    MissingCredential(&'static str),

    /// The network call did not complete
    #[error("Azure request failed: {0}")]
    Transport(String),

    /// Azure answered with an error status
    #[error("Azure returned HTTP {status}: {message}")]
    Http {
        /// HTTP status
        status: u16,
        /// Response body
        message: String,
    },

    /// A response could not be decoded
    #[error("Unexpected Azure response: {0}")]
    Decode(String),

    /// The Azure CLI failed
    #[error(transparent)]
    Cli(#[from] ProcessError),
}

impl From<reqwest::Error> for AzureError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AzureError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => AzureError::Transport(err.to_string()),
        }
    }
}

/// Cache key of an ACR token: `LOCALLY_AZURE_<NAME>_ACR_TOKEN`
///
/// The registry name is upper-cased and every non-alphanumeric character
/// becomes `_`.
#[must_use]
pub fn acr_cache_key(acr: &str) -> String {
    let encoded: String = acr
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("LOCALLY_AZURE_{encoded}_ACR_TOKEN")
}

/// `exp` claim of a JWT, if it can be read
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<i64>,
}

/// Process-scoped token cache
///
/// Tokens live in memory only. A variable with the cache key in the process
/// environment is honored as a pre-seeded entry.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<AHashMap<String, CachedToken>>,
}

impl TokenCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token that is still valid at `now` (unix seconds)
    #[must_use]
    pub fn get_at(&self, key: &str, now: i64) -> Option<String> {
        let fresh = |expires_at: Option<i64>| {
            expires_at.is_none_or(|exp| now < exp - EXPIRY_MARGIN_SECS)
        };

        {
            let mut entries = self.entries.lock();
            if let Some(cached) = entries.get(key) {
                if fresh(cached.expires_at) {
                    return Some(cached.token.clone());
                }
                tracing::debug!(key = %key, "Cached token expired");
                entries.remove(key);
            }
        }

        let preset = std::env::var(key).ok().filter(|t| !t.is_empty())?;
        fresh(jwt_expiry(&preset)).then_some(preset)
    }

    /// Returns a token that is still valid now
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, chrono::Utc::now().timestamp())
    }

    /// Stores a token; its expiry is read from the JWT `exp` claim
    pub fn put(&self, key: &str, token: impl Into<String>) {
        let token = token.into();
        let expires_at = jwt_expiry(&token);
        self.entries
            .lock()
            .insert(key.to_string(), CachedToken { token, expires_at });
    }
}

/// Registry login obtained through the Azure CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcrCredentials {
    /// Registry host, e.g. `team.azurecr.io`
    pub login_server: String,
    /// User name to pass to `docker login`
    pub username: String,
    /// Refresh token
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcrTokenResponse {
    access_token: String,
    #[serde(default)]
    login_server: Option<String>,
}

/// Returns registry credentials for `acr`, asking the Azure CLI only when
/// the cache holds no valid token
///
/// # Errors
///
/// Fails when the Azure CLI fails or prints an unexpected document.
pub fn acr_login(acr: &str, cache: &TokenCache, az: &str) -> Result<AcrCredentials, AzureError> {
    let key = acr_cache_key(acr);
    let default_server = format!("{}.azurecr.io", acr.to_lowercase());

    if let Some(token) = cache.get(&key) {
        tracing::debug!(acr = %acr, "Using cached ACR token");
        return Ok(AcrCredentials {
            login_server: default_server,
            username: ACR_TOKEN_USER.to_string(),
            token,
        });
    }

    let output = ProcessCommand::new(az)
        .args(["acr", "login", "--name", acr, "--expose-token", "--output", "json"])
        .run()?;
    let response: AcrTokenResponse =
        serde_json::from_str(&output.stdout).map_err(|e| AzureError::Decode(e.to_string()))?;
    cache.put(&key, response.access_token.clone());
    tracing::info!(acr = %acr, "ACR token refreshed");

    Ok(AcrCredentials {
        login_server: response.login_server.unwrap_or(default_server),
        username: ACR_TOKEN_USER.to_string(),
        token: response.access_token,
    })
}

/// Source of secrets for Key Vault sync
pub trait SecretProvider {
    /// Lists every enabled secret as name/value pairs
    ///
    /// # Errors
    ///
    /// Fails on authentication, transport or decoding errors.
    fn list_secrets(&self) -> Result<Map<String, Value>, AzureError>;
}

/// Creates secret providers for Key Vault sync tasks
pub trait SecretProviderFactory: Send + Sync {
    /// Provider for the vault described by `params`
    ///
    /// # Errors
    ///
    /// Fails when credentials are missing or the client cannot be built.
    fn create(&self, params: &KeyvaultSyncParameters) -> Result<Box<dyn SecretProvider>, AzureError>;
}

/// Service principal used for client-credentials authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipal {
    /// Directory (tenant) id
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl ServicePrincipal {
    /// Task inputs first, then `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
    /// `AZURE_CLIENT_SECRET`
    ///
    /// # Errors
    ///
    /// Fails when any of the three values is missing.
    pub fn from_params_or_env(params: &KeyvaultSyncParameters) -> Result<Self, AzureError> {
        let pick = |given: &Option<String>, var: &'static str| {
            given
                .clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
                .ok_or(AzureError::MissingCredential(var))
        };
        Ok(Self {
            tenant_id: pick(&params.tenant_id, "AZURE_TENANT_ID")?,
            client_id: pick(&params.client_id, "AZURE_CLIENT_ID")?,
            client_secret: pick(&params.client_secret, "AZURE_CLIENT_SECRET")?,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct SecretItem {
    id: String,
    #[serde(default)]
    attributes: Option<SecretAttributes>,
}

#[derive(Deserialize)]
struct SecretAttributes {
    #[serde(default = "enabled_default")]
    enabled: bool,
}

fn enabled_default() -> bool {
    true
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// Key Vault REST client
#[derive(Debug)]
pub struct KeyVaultClient {
    http: reqwest::blocking::Client,
    vault_uri: String,
    principal: ServicePrincipal,
    authority: String,
}

impl KeyVaultClient {
    /// Creates a client for `vault_uri`
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(vault_uri: &str, principal: ServicePrincipal) -> Result<Self, AzureError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(AZURE_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            vault_uri: vault_uri.trim_end_matches('/').to_string(),
            principal,
            authority: "https://login.microsoftonline.com".to_string(),
        })
    }

    fn access_token(&self) -> Result<String, AzureError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.principal.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.principal.client_id.as_str()),
            ("client_secret", self.principal.client_secret.as_str()),
            ("scope", KEYVAULT_SCOPE),
        ];
        let response: TokenResponse = self
            .http
            .post(url)
            .form(&form)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.access_token)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, AzureError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .send()?
            .error_for_status()?
            .json()?)
    }
}

/// Secret name from a secret id URL
fn secret_name(id: &str) -> Option<&str> {
    let rest = id.split("/secrets/").nth(1)?;
    rest.split('/').next().filter(|n| !n.is_empty())
}

impl SecretProvider for KeyVaultClient {
    fn list_secrets(&self) -> Result<Map<String, Value>, AzureError> {
        let token = self.access_token()?;
        let mut secrets = Map::new();
        let mut next = Some(format!(
            "{}/secrets?api-version={KEYVAULT_API_VERSION}",
            self.vault_uri
        ));

        while let Some(url) = next.take() {
            let page: SecretPage = self.get_json(&url, &token)?;
            for item in page.value {
                if item.attributes.as_ref().is_some_and(|a| !a.enabled) {
                    continue;
                }
                let Some(name) = secret_name(&item.id) else {
                    continue;
                };
                let bundle: SecretBundle = self.get_json(
                    &format!("{}/secrets/{name}?api-version={KEYVAULT_API_VERSION}", self.vault_uri),
                    &token,
                )?;
                secrets.insert(name.to_lowercase(), Value::String(bundle.value));
            }
            next = page.next_link.filter(|link| !link.is_empty());
        }

        tracing::info!(vault = %self.vault_uri, secrets = secrets.len(), "Key Vault listed");
        Ok(secrets)
    }
}

/// Factory building [`KeyVaultClient`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureKeyVaultFactory;

impl SecretProviderFactory for AzureKeyVaultFactory {
    fn create(&self, params: &KeyvaultSyncParameters) -> Result<Box<dyn SecretProvider>, AzureError> {
        let principal = ServicePrincipal::from_params_or_env(params)?;
        Ok(Box::new(KeyVaultClient::new(&params.uri, principal)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn jwt(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("eyJhbGciOiJub25lIn0.{payload}.sig")
    }

    #[test]
    fn test_acr_cache_key() {
        assert_eq!(acr_cache_key("team-acr"), "LOCALLY_AZURE_TEAM_ACR_ACR_TOKEN");
        assert_eq!(acr_cache_key("shared.dev"), "LOCALLY_AZURE_SHARED_DEV_ACR_TOKEN");
    }

    #[test]
    fn test_jwt_expiry() {
        assert_eq!(jwt_expiry(&jwt(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(jwt_expiry("not-a-jwt"), None);
    }

    #[test]
    fn test_token_valid_until_margin() {
        let cache = TokenCache::new();
        let key = "LOCALLY_AZURE_TEST_MARGIN_ACR_TOKEN";
        cache.put(key, jwt(1_000));

        assert!(cache.get_at(key, 900).is_some());
        assert!(cache.get_at(key, 939).is_some());
        assert!(cache.get_at(key, 940).is_none());
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = TokenCache::new();
        let key = "LOCALLY_AZURE_TEST_DROPPED_ACR_TOKEN";
        cache.put(key, jwt(1_000));
        assert!(cache.get_at(key, 2_000).is_none());
        assert!(cache.entries.lock().get(key).is_none());
    }

    #[test]
    fn test_secret_name_from_id() {
        assert_eq!(
            secret_name("https://team.vault.azure.net/secrets/Db-Password"),
            Some("Db-Password")
        );
        assert_eq!(
            secret_name("https://team.vault.azure.net/secrets/api/abc123"),
            Some("api")
        );
        assert_eq!(secret_name("https://team.vault.azure.net/keys/x"), None);
    }

    #[test]
    fn test_principal_prefers_task_inputs() {
        let params = KeyvaultSyncParameters {
            uri: "https://team.vault.azure.net".to_string(),
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..KeyvaultSyncParameters::default()
        };
        let principal = ServicePrincipal::from_params_or_env(&params).unwrap();
        assert_eq!(principal.tenant_id, "tenant");
        assert_eq!(principal.client_secret, "secret");
    }
}
